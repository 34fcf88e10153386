// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::allocator;
use crate::kernel::Kernel;
use crate::println;
use crate::repl::Repl;
use crate::result::Result;

/// `memstat`: kernel heap counters.
pub fn memstat(
    _kernel: &mut Kernel,
    _repl: &mut Repl,
    _args: &[&str],
) -> Result<()> {
    let Some(stats) = allocator::stats() else {
        println!("kernel heap not installed");
        return Ok(());
    };
    println!("heap: {} KiB", stats.heap_size / 1024);
    println!(
        "used: {} bytes ({}%)",
        stats.used_bytes,
        stats.used_bytes * 100 / stats.heap_size.max(1)
    );
    println!(
        "free: {} bytes ({}%)",
        stats.free_bytes,
        stats.free_bytes * 100 / stats.heap_size.max(1)
    );
    println!("blocks: {}", stats.blocks);
    println!("allocations: {}", stats.allocations);
    println!("frees: {}", stats.frees);
    println!("memory errors: {}", stats.memory_errors);
    println!("corrupted blocks: {}", stats.corrupted_blocks);
    if stats.memory_errors > 0 {
        println!("WARNING: memory corruption detected");
    }
    Ok(())
}

/// `fsstat`: cache effectiveness and table occupancy.
pub fn fsstat(
    kernel: &mut Kernel,
    _repl: &mut Repl,
    _args: &[&str],
) -> Result<()> {
    let stats = kernel.fs.cache_stats();
    let total = stats.hits + stats.misses;
    let rate = if total > 0 { stats.hits * 100 / total } else { 0 };
    println!(
        "block cache: {} hits, {} misses ({rate}% hit rate)",
        stats.hits, stats.misses
    );
    println!("open handles: {}", kernel.handles.open_count());
    println!("active processes: {}", kernel.procs.active());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes;

    #[test]
    fn stats_commands_do_not_fail() {
        let mut kernel = fakes::kernel(512);
        let mut repl = Repl::new();
        kernel.write_file_from("/f", b"x").unwrap();
        memstat(&mut kernel, &mut repl, &[]).unwrap();
        fsstat(&mut kernel, &mut repl, &[]).unwrap();
        let stats = kernel.fs.cache_stats();
        assert!(stats.hits + stats.misses > 0);
    }
}
