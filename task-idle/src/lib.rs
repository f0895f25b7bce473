//! `idle`: the reserved slot-0 process (§4.5, `kernel::sched::IDLE_PIDX`).
//! Never scheduled by name, only as the scheduler's fallback when nothing
//! else is runnable — so there is nothing for it to do but get out of the
//! way immediately.

#![cfg_attr(not(any(test, feature = "sim")), no_std)]

use userlib::hl;

pub fn main() -> ! {
    loop {
        hl::sys_yield();
    }
}
