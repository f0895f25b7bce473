//! Shutdown path (§4.10).

use crate::frame::FrameTable;
use crate::region::RegionTable;
use crate::task::{ProcessState, ProcessTable};

/// Terminates every live process, releasing its frames and known-memory
/// leases. Does not itself call the firmware/host shutdown primitive — that
/// is `kernel::arch`'s job, invoked by the caller once this returns.
pub fn shutdown_all_processes(
    arch: &mut dyn crate::arch::Arch,
    procs: &mut ProcessTable,
    frames: &mut FrameTable,
    regions: &mut RegionTable,
) {
    let mut terminated = 0i32;
    for (pidx, proc) in procs.iter_mut() {
        if proc.is_live() {
            proc.state = ProcessState::Terminated;
            frames.free_process(pidx);
            regions.release_all(pidx);
            terminated += 1;
        }
    }
    crate::klog::klog(arch, "shutdown: terminated %d processes", &[crate::klog::Arg::Int(terminated)]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Spawn;
    use abi::Pidx;

    #[test]
    fn shutdown_releases_every_frame_and_lease() {
        let mut procs = ProcessTable::new();
        let mut frames = FrameTable::new();
        let mut regions = RegionTable::new();

        let p = procs
            .create(&Spawn {
                name: "x",
                entry: 0,
                args: None,
                kernel_mode: true,
            })
            .unwrap();
        let base = frames.allocate(p, 2).unwrap();
        regions.lock(abi::KnownRegion::Framebuffer, 1, p);

        let mut arch = crate::arch::sim::SimArch::new();
        shutdown_all_processes(&mut arch, &mut procs, &mut frames, &mut regions);

        assert_eq!(procs.get(p).state, ProcessState::Terminated);
        assert_eq!(frames.lookup(base), None);
        assert!(regions
            .lock(abi::KnownRegion::Framebuffer, 1, Pidx(p.index() as u16 + 1))
            .is_some());
    }
}
