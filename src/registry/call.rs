//! Synchronous `call`-style lookup helper (spec.md §4.6, §9).
//!
//! Single-threaded kernels have no blocking primitive to wait on, so the
//! helper spawns an ephemeral "waiter" actor, sends the request from it, and
//! pumps the scheduler step-by-step until either a reply lands in the
//! waiter's shared cell or the step budget runs out — preserving the
//! step-budget bound spec.md §9 calls for "to avoid pathological pumping on a
//! stuck system".

use std::cell::RefCell;
use std::rc::Rc;

use crate::actor::{ActorId, Behavior, ExitReason};
use crate::error::RegistryError;
use crate::kernel::Kernel;
use crate::message::Message;

struct Waiter {
    slot: Rc<RefCell<Option<Message>>>,
}

impl Behavior for Waiter {
    fn handle(&mut self, kernel: &mut Kernel, msg: Message) -> bool {
        *self.slot.borrow_mut() = Some(msg);
        kernel.stop_self(ExitReason::Normal);
        false
    }
}

/// Send `(type_tag, payload)` to `dest` and pump the scheduler until a reply
/// is observed or `budget` steps have run with no result.
pub fn call(
    kernel: &mut Kernel,
    dest: ActorId,
    type_tag: u32,
    payload: Vec<u8>,
    budget: u32,
) -> Result<Message, RegistryError> {
    let slot = Rc::new(RefCell::new(None));
    let waiter_slot = slot.clone();
    let waiter_id = kernel
        .spawn(None, 4, move |_id| Box::new(Waiter { slot: waiter_slot }) as Box<dyn Behavior>)
        .map_err(|_| RegistryError::CallBudgetExhausted(0))?;

    kernel
        .send_as(waiter_id, dest, type_tag, payload)
        .map_err(|_| RegistryError::CallBudgetExhausted(0))?;

    let mut remaining = budget;
    while remaining > 0 {
        if slot.borrow().is_some() {
            break;
        }
        if !kernel.step() {
            break;
        }
        remaining -= 1;
    }

    let result = slot.borrow_mut().take();
    match result {
        Some(msg) => Ok(msg),
        None => {
            kernel.stop(waiter_id, ExitReason::Killed);
            Err(RegistryError::CallBudgetExhausted(budget))
        }
    }
}
