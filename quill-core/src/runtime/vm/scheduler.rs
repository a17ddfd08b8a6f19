//! 协作式调度
//!
//! 单线程运行队列。任务只在挂起点让出：时间片用尽时排到队尾，
//! 设置了 sleep 时进入休眠表；所有任务都在休眠时执行器睡到最早的唤醒时间。

use super::frame::Task;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::trace;

const TARGET: &str = "quill::vm";

#[derive(Debug, Default)]
pub struct Scheduler {
    ready: VecDeque<Task>,
    sleeping: Vec<(Instant, Task)>,
    next_id: usize,
}

/// 取下一个任务的结果
#[derive(Debug)]
pub enum Next {
    Run(Task),
    /// 等待期间到达截止时间
    Deadline,
    Empty,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配任务 id；主任务是 0
    pub fn allocate_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, task: Task) {
        self.ready.push_back(task);
    }

    pub fn sleep(&mut self, task: Task, until: Instant) {
        trace!(target: TARGET, task = task.id, "task sleeping");
        self.sleeping.push((until, task));
    }

    pub fn len(&self) -> usize {
        self.ready.len() + self.sleeping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wake_due(&mut self, now: Instant) {
        let mut idx = 0;
        while idx < self.sleeping.len() {
            if self.sleeping[idx].0 <= now {
                let (_, task) = self.sleeping.remove(idx);
                self.ready.push_back(task);
            } else {
                idx += 1;
            }
        }
    }

    /// 下一个可运行的任务；必要时阻塞等待，但不会越过 `deadline`
    pub fn next(&mut self, deadline: Option<Instant>) -> Next {
        self.wake_due(Instant::now());
        if let Some(task) = self.ready.pop_front() {
            return Next::Run(task);
        }
        let Some(earliest) = self.sleeping.iter().map(|(at, _)| *at).min() else {
            return Next::Empty;
        };
        let until = match deadline {
            Some(deadline) if deadline < earliest => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                return Next::Deadline;
            }
            _ => earliest,
        };
        std::thread::sleep(until.saturating_duration_since(Instant::now()));
        self.wake_due(Instant::now().max(until));
        match self.ready.pop_front() {
            Some(task) => Next::Run(task),
            None => Next::Empty,
        }
    }
}
