use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{
    NewUser, ProfileUpdate, StoreError, StoreResult, Todo, TodoFields, TodoStore, User, UserStore,
};

/// In-process store for tests. Enforces the same uniqueness and ownership
/// rules as the schema does.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    todos: Vec<Todo>,
    next_user_id: i64,
    next_todo_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn set_active(&self, id: i64, active: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(u) = inner.users.iter_mut().find(|u| u.id == id) {
            u.is_active = active;
        }
    }
}

impl Inner {
    fn taken(&self, field: &'static str, value: &str, except: Option<i64>) -> bool {
        self.users.iter().any(|u| {
            Some(u.id) != except
                && match field {
                    "email" => u.email == value,
                    _ => u.name == value,
                }
        })
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taken("email", &user.email, None) {
            return Err(StoreError::Duplicate("email"));
        }
        if inner.taken("name", &user.name, None) {
            return Err(StoreError::Duplicate("name"));
        }
        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            name: user.name,
            email: user.email,
            created_at: OffsetDateTime::now_utc(),
            birth_date: None,
            photo_url: user.photo_url,
            short_term_goal: user.short_term_goal,
            long_term_goal: user.long_term_goal,
            hashed_password: user.hashed_password,
            is_active: true,
            role: user.role,
            health_data_integration_status: false,
        };
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_email(&self, id: i64, email: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taken("email", email, Some(id)) {
            return Err(StoreError::Duplicate("email"));
        }
        Ok(match inner.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.email = email.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_password_hash(&self, id: i64, hashed_password: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(match inner.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.hashed_password = hashed_password.to_string();
                true
            }
            None => false,
        })
    }

    async fn update_profile(&self, id: i64, p: ProfileUpdate) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taken("name", &p.name, Some(id)) {
            return Err(StoreError::Duplicate("name"));
        }
        Ok(match inner.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.name = p.name;
                u.photo_url = p.photo_url;
                u.short_term_goal = Some(p.short_term_goal);
                u.long_term_goal = Some(p.long_term_goal);
                u.health_data_integration_status = p.health_data_integration_status;
                u.birth_date = p.birth_date;
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        let removed = inner.users.len() != before;
        if removed {
            inner.todos.retain(|t| t.owner_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Todo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .todos
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find(&self, id: i64, owner_id: i64) -> StoreResult<Option<Todo>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .todos
            .iter()
            .find(|t| t.id == id && t.owner_id == owner_id)
            .cloned())
    }

    async fn create(&self, owner_id: i64, f: TodoFields) -> StoreResult<Todo> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::UnknownOwner);
        }
        inner.next_todo_id += 1;
        let todo = Todo {
            id: inner.next_todo_id,
            title: f.title,
            description: f.description,
            complete: f.complete,
            category_id: f.category_id,
            created_at: OffsetDateTime::now_utc(),
            notification_time: f.notification_time,
            owner_id,
        };
        inner.todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: i64, owner_id: i64, f: TodoFields) -> StoreResult<Option<Todo>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(owned_mut(&mut inner, id, owner_id).map(|t| {
            t.title = f.title;
            t.description = f.description;
            t.complete = f.complete;
            t.category_id = f.category_id;
            t.notification_time = f.notification_time;
            t.clone()
        }))
    }

    async fn set_complete(
        &self,
        id: i64,
        owner_id: i64,
        complete: bool,
    ) -> StoreResult<Option<Todo>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(owned_mut(&mut inner, id, owner_id).map(|t| {
            t.complete = complete;
            t.clone()
        }))
    }

    async fn set_notification_time(
        &self,
        id: i64,
        owner_id: i64,
        notification_time: Option<OffsetDateTime>,
    ) -> StoreResult<Option<Todo>> {
        let mut inner = self.inner.lock().unwrap();
        Ok(owned_mut(&mut inner, id, owner_id).map(|t| {
            t.notification_time = notification_time;
            t.clone()
        }))
    }

    async fn delete(&self, id: i64, owner_id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.todos.len();
        inner
            .todos
            .retain(|t| !(t.id == id && t.owner_id == owner_id));
        Ok(inner.todos.len() != before)
    }
}

fn owned_mut(inner: &mut Inner, id: i64, owner_id: i64) -> Option<&mut Todo> {
    inner
        .todos
        .iter_mut()
        .find(|t| t.id == id && t.owner_id == owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            photo_url: String::new(),
            short_term_goal: None,
            long_term_goal: None,
            hashed_password: "$argon2id$placeholder".into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email_and_name() {
        let store = MemoryStore::new();
        UserStore::create(&store, new_user("alice", "a@x.com"))
            .await
            .expect("first insert");

        let err = UserStore::create(&store, new_user("bob", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));

        let err = UserStore::create(&store, new_user("alice", "b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("name")));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn deleted_owner_loses_todos_and_cannot_add_more() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, new_user("alice", "a@x.com"))
            .await
            .unwrap();
        let fields = TodoFields {
            title: "buy milk".into(),
            description: "two litres".into(),
            complete: false,
            category_id: "home".into(),
            notification_time: None,
        };
        TodoStore::create(&store, user.id, fields).await.unwrap();

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(store.list_for_owner(user.id).await.unwrap().is_empty());

        let fields = TodoFields {
            title: "buy bread".into(),
            description: "sourdough".into(),
            complete: false,
            category_id: "home".into(),
            notification_time: None,
        };
        let err = TodoStore::create(&store, user.id, fields).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownOwner));
    }
}
