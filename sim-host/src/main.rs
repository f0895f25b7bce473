//! `sim-host`: boots the kernel's native-thread (`sim`) architecture backend
//! (SPEC_FULL §E) and runs the demo task image to completion.
//!
//! Every task here is a plain Rust function linked straight into this
//! binary and handed to the kernel as a `Spawn::entry` pointer — there is
//! no on-disk image format or loader, matching the "no dynamic linking"
//! Non-goal.

use clap::Parser;

use kernel::arch::sim::SimArch;
use kernel::startup;
use kernel::task::Spawn;

#[derive(Parser)]
#[command(about = "Runs the demo microkernel image under the native-thread sim backend")]
struct Args {
    /// Bytes queued as GETCHAR input before boot.
    #[arg(long)]
    input: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut arch = SimArch::new();
    if let Some(input) = &args.input {
        arch.feed_input(input.as_bytes());
    }

    let tasks = [
        Spawn {
            name: "idle",
            entry: task_idle::main as usize,
            args: None,
            kernel_mode: true,
        },
        Spawn {
            name: "shell",
            entry: task_shell::main as usize,
            args: None,
            kernel_mode: false,
        },
        Spawn {
            name: "fib",
            entry: svc_fib::main as usize,
            args: None,
            kernel_mode: false,
        },
        Spawn {
            name: "echo",
            entry: svc_echo::main as usize,
            args: None,
            kernel_mode: false,
        },
    ];

    log::info!("booting {} tasks", tasks.len());
    startup::run(&mut arch, &tasks)
}
