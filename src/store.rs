use crate::coerce::tasks_from_json;
use crate::ids::IdGenerator;
use crate::storage::{read_or_absent, write_or_log, Storage};
use crate::task::{normalize_due_date, Filter, NewTask, Priority, Task, TaskId};
use serde::Serialize;
use std::sync::Arc;

pub const TODOS_KEY: &str = "todos";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub total: usize,
    pub done: usize,
    pub remaining: usize,
}

/// Ordered task list, written through to storage after every mutation.
///
/// Id-keyed operations act on the first task carrying the id and silently do
/// nothing when no task matches.
pub struct TaskStore {
    storage: Arc<dyn Storage>,
    tasks: Vec<Task>,
    ids: IdGenerator,
}

impl TaskStore {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let mut ids = IdGenerator::new();
        let tasks = match read_or_absent(storage.as_ref(), TODOS_KEY) {
            Some(raw) => tasks_from_json(&raw, &mut ids),
            None => Vec::new(),
        };
        log::debug!("loaded {} tasks", tasks.len());
        Self { storage, tasks, ids }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter_filtered(&self, filter: Filter) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| filter.matches(t))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn counts(&self) -> Counts {
        let done = self.tasks.iter().filter(|t| t.done).count();
        Counts { total: self.tasks.len(), done, remaining: self.tasks.len() - done }
    }

    pub fn add(&mut self, task: impl Into<NewTask>) -> TaskId {
        let NewTask { text, priority, due_date } = task.into();
        let id = self.ids.next_id();
        let due_date = normalize_due_date(due_date);
        self.tasks.push(Task { id, text, done: false, priority, due_date });
        self.persist();
        id
    }

    pub fn remove(&mut self, id: TaskId) {
        self.tasks.retain(|t| t.id != id);
        self.persist();
    }

    pub fn toggle(&mut self, id: TaskId) {
        self.modify(id, |t| t.done = !t.done);
    }

    pub fn set_done(&mut self, id: TaskId, done: bool) {
        self.modify(id, |t| t.done = done);
    }

    pub fn update_text(&mut self, id: TaskId, text: impl Into<String>) {
        let text = text.into();
        self.modify(id, |t| t.text = text);
    }

    pub fn update_priority(&mut self, id: TaskId, priority: Priority) {
        self.modify(id, |t| t.priority = priority);
    }

    pub fn update_due_date(&mut self, id: TaskId, due_date: Option<String>) {
        let due_date = normalize_due_date(due_date);
        self.modify(id, |t| t.due_date = due_date);
    }

    pub fn clear_done(&mut self) {
        self.tasks.retain(|t| !t.done);
        self.persist();
    }

    fn modify(&mut self, id: TaskId, f: impl FnOnce(&mut Task)) {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => f(task),
            None => log::debug!("no task with id {}", id),
        }
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_string(&self.tasks) {
            Ok(content) => write_or_log(self.storage.as_ref(), TODOS_KEY, &content),
            Err(e) => log::error!("failed to serialize tasks: {}", e),
        }
    }
}
