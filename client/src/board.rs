// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Task board organization.
//!
//! Turns a flat list of tasks into four state buckets sorted by due date and
//! classifies tasks as overdue / due soon. Everything here is a pure function
//! of its input and the injected [`Clock`].

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use taskboard_common::{Task, TaskState};

/// A task due within this many hours (and not yet overdue) is "due soon".
pub const DUE_SOON_HOURS: i64 = 12;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    Overdue,
    DueSoon,
    Normal,
}

/// Tasks partitioned by state, each bucket ordered by due date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBoard {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub done: Vec<Task>,
    pub archived: Vec<Task>,
}

impl TaskBoard {
    /// Sorts `tasks` by due date and splits them by state. The archived bucket
    /// is always filled; hiding it is up to the caller.
    pub fn organize(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut tasks: Vec<Task> = tasks.into_iter().collect();
        sort_by_due_date(&mut tasks);

        let mut board = TaskBoard::default();
        for task in tasks {
            match task.state {
                TaskState::Todo => board.todo.push(task),
                TaskState::InProgress => board.in_progress.push(task),
                TaskState::Done => board.done.push(task),
                TaskState::Archived => board.archived.push(task),
            }
        }
        board
    }

    pub fn bucket(&self, state: TaskState) -> &[Task] {
        match state {
            TaskState::Todo => &self.todo,
            TaskState::InProgress => &self.in_progress,
            TaskState::Done => &self.done,
            TaskState::Archived => &self.archived,
        }
    }

    /// Whether there is anything to display. Archived tasks only count when
    /// they are being shown.
    pub fn has_any_tasks(&self, include_archived: bool) -> bool {
        !self.todo.is_empty()
            || !self.in_progress.is_empty()
            || !self.done.is_empty()
            || (include_archived && !self.archived.is_empty())
    }
}

/// A board together with the archive toggle it was loaded with.
///
/// The toggle is applied twice: it decides whether archived tasks are fetched
/// at all, and [`BoardView::has_any_tasks`] checks it again before counting them.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardView {
    pub board: TaskBoard,
    pub include_archived: bool,
}

impl BoardView {
    pub fn new(tasks: impl IntoIterator<Item = Task>, include_archived: bool) -> Self {
        Self {
            board: TaskBoard::organize(tasks),
            include_archived,
        }
    }

    pub fn has_any_tasks(&self) -> bool {
        self.board.has_any_tasks(self.include_archived)
    }
}

/// Stable ascending sort on `due_date`; tasks without one go last.
pub fn sort_by_due_date(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| compare_due_dates(a.due_date, b.due_date));
}

fn compare_due_dates(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Overdue wins over due-soon, so a task is never both.
pub fn due_status(task: &Task, clock: &dyn Clock) -> DueStatus {
    let Some(due) = task.due_date else {
        return DueStatus::Normal;
    };
    let now = clock.now();
    if due < now {
        DueStatus::Overdue
    } else if due - now <= Duration::hours(DUE_SOON_HOURS) {
        DueStatus::DueSoon
    } else {
        DueStatus::Normal
    }
}

pub fn is_overdue(task: &Task, clock: &dyn Clock) -> bool {
    due_status(task, clock) == DueStatus::Overdue
}

pub fn is_due_soon(task: &Task, clock: &dyn Clock) -> bool {
    due_status(task, clock) == DueStatus::DueSoon
}
