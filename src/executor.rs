//! The execution protocol for task chains.
//!
//! Execution always begins at the root of a chain and flows forward through
//! each node's action. Per node, exactly one of the success or failure paths
//! runs: success invokes the completion handlers, records the result, splices
//! a delegated chain ahead of the declared children, then executes every
//! child in attachment order; failure invokes the error handlers and cascades
//! the fault through the whole subtree without running any descendant action.
//! Cleanup handlers run exactly once on either path.
//!
//! No borrow of the chain arena is ever held across a user callback, so
//! actions and handlers are free to re-enter the engine, e.g. to `start`
//! another chain before returning.

use crate::error::Fault;
use crate::node::{CompletedHandler, ErrorHandler, Output, State, Value};
use crate::task::Task;

/// One-shot continuation capability handed to a task action.
///
/// Every method consumes the resolver, so an action can signal at most once.
/// The resolver is `'static` and may be stashed away and consumed later from
/// a different call stack, such as a timer or network callback; the chain
/// simply stays suspended until then.
pub struct Resolver {
    task: Task,
}

impl Resolver {
    /// Signals success with a plain value.
    pub fn succeed<T: 'static>(self, value: T) {
        complete(&self.task, Output::Value(Value::new(value)));
    }

    /// Signals success by handing execution off to another chain node.
    ///
    /// The delegated node's subtree runs in full before this node's declared
    /// children do.
    pub fn delegate(self, task: Task) {
        complete(&self.task, Output::Chain(task));
    }

    /// Signals failure with a fault.
    pub fn fail(self, fault: impl Into<Fault>) {
        fail(&self.task, fault.into());
    }
}

pub(crate) fn start(
    task: &Task,
    on_completed: Option<CompletedHandler>,
    on_error: Option<ErrorHandler>,
) {
    let root = task.root();
    if root.same_node(task) {
        execute(&root, None, on_completed, on_error);
    } else {
        // The caller's interest point is this node, so its handlers land
        // here; execution still replays the whole chain from the root.
        {
            let mut arena = task.chain.borrow_mut();
            let node = arena.get_mut(task.id);
            if let Some(handler) = on_completed {
                node.on_completed.push(handler);
            }
            if let Some(handler) = on_error {
                node.on_error.push(handler);
            }
        }
        execute(&root, None, None, None);
    }
}

fn execute(
    task: &Task,
    prev: Option<Task>,
    on_completed: Option<CompletedHandler>,
    on_error: Option<ErrorHandler>,
) {
    let action = {
        let mut arena = task.chain.borrow_mut();
        let node = arena.get_mut(task.id);
        if let Some(handler) = on_completed {
            node.on_completed.push(handler);
        }
        if let Some(handler) = on_error {
            node.on_error.push(handler);
        }
        if node.state != State::Pending {
            tracing::warn!("task {} already started, ignoring", task.id.0);
            return;
        }
        node.state = State::Running;
        node.action.take()
    };

    let Some(action) = action else { return };

    tracing::trace!("invoking action of task {}", task.id.0);
    let resolver = Resolver { task: task.clone() };
    if let Err(err) = action(prev, resolver) {
        // Uniform failure path: an error returned from the action body is
        // treated exactly like an explicit `fail` call, unless the action
        // already signaled.
        fail(task, Fault::from(err));
    }
}

fn complete(task: &Task, output: Output) {
    let handlers = {
        let mut arena = task.chain.borrow_mut();
        let node = arena.get_mut(task.id);
        if matches!(node.state, State::Succeeded | State::Failed) {
            tracing::debug!("ignoring completion signal for finished task {}", task.id.0);
            return;
        }
        node.state = State::Succeeded;
        std::mem::take(&mut node.on_completed)
    };

    // Handlers observe the output before it is recorded on the node.
    for handler in handlers {
        handler(&output);
    }

    let (delegated, children) = {
        let mut arena = task.chain.borrow_mut();
        let node = arena.get_mut(task.id);
        node.result = Some(output.clone());
        let delegated = match &output {
            Output::Chain(sub) => Some(sub.clone()),
            Output::Value(_) => None,
        };
        (delegated, node.children.clone())
    };

    if let Some(sub) = delegated {
        tracing::trace!("task {} delegated to a nested chain", task.id.0);
        execute(&sub, Some(task.clone()), None, None);
    }
    for child in children {
        execute(&task.at(child), Some(task.clone()), None, None);
    }

    finish(task);
}

fn fail(task: &Task, fault: Fault) {
    let handlers = {
        let mut arena = task.chain.borrow_mut();
        let node = arena.get_mut(task.id);
        if matches!(node.state, State::Succeeded | State::Failed) {
            tracing::debug!("ignoring failure signal for finished task {}", task.id.0);
            return;
        }
        node.state = State::Failed;
        std::mem::take(&mut node.on_error)
    };

    tracing::debug!("task {} failed: {}", task.id.0, fault);
    for handler in handlers {
        handler(&fault);
    }

    // Descendants are error-notified directly; their actions never run.
    let children = task.chain.borrow().get(task.id).children.clone();
    for child in children {
        fail(&task.at(child), fault.clone());
    }

    finish(task);
}

fn finish(task: &Task) {
    let handlers = {
        let mut arena = task.chain.borrow_mut();
        std::mem::take(&mut arena.get_mut(task.id).on_finally)
    };
    for handler in handlers {
        handler();
    }
}
