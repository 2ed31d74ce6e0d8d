use crate::{AgentStatusUpdate, TaskState, TaskStatus};

/// Field-wise merge of an incoming update into the task state.
///
/// Precedence per field:
/// - `status`: taken from the update, except that `IDLE` is ignored for a live
///   task and a non-terminal status never leaves `STOPPING`.
/// - `is_running`, `thinking`, `instruction`: overwritten only when carried.
/// - `task_id`, `screenshot`, `timestamp`: not merged here; identity gating and
///   screenshot loading happen in `update`.
///
/// Returns true when any field changed.
pub fn merge_update(task: &mut TaskState, update: &AgentStatusUpdate) -> bool {
    let mut changed = false;

    if let Some(reported) = update.status {
        let next = next_status(task.status, reported);
        if next != task.status {
            task.status = next;
            changed = true;
        }
    }
    if let Some(is_running) = update.is_running {
        changed |= replace(&mut task.is_running, is_running);
    }
    if let Some(thinking) = update.thinking {
        changed |= replace(&mut task.thinking, thinking);
    }
    if let Some(instruction) = &update.instruction {
        if task.instruction.as_deref() != Some(instruction.as_str()) {
            task.instruction = Some(instruction.clone());
            changed = true;
        }
    }

    changed
}

fn next_status(current: TaskStatus, reported: TaskStatus) -> TaskStatus {
    if current.is_terminal() || reported == TaskStatus::Idle {
        return current;
    }
    if current == TaskStatus::Stopping && !reported.is_terminal() {
        return current;
    }
    reported
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
