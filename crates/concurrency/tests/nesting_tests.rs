//! Nesting Depth Tests
//!
//! Depth bookkeeping across arbitrary enter/leave sequences and threads.

use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use txretry_concurrency::{
    current_depth, enter, is_nested, ExecutionContext, ExplicitContext, ThreadContext,
};

fn nest(ctx: &ExplicitContext, levels: usize, observed_max: &mut usize) {
    if levels == 0 {
        return;
    }
    let guard = enter(ctx);
    *observed_max = (*observed_max).max(guard.depth());
    assert_eq!(guard.is_nested(false), guard.depth() > 1);
    nest(ctx, levels - 1, observed_max);
}

proptest! {
    #[test]
    fn depth_returns_to_zero(levels in 0usize..64) {
        let ctx = ExplicitContext::new();
        let mut observed_max = 0;
        nest(&ctx, levels, &mut observed_max);
        prop_assert_eq!(observed_max, levels);
        prop_assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn open_transaction_always_nested(levels in 1usize..8) {
        let ctx = ExplicitContext::new();
        let guards: Vec<_> = (0..levels).map(|_| enter(&ctx)).collect();
        prop_assert!(is_nested(&ctx, true));
        prop_assert_eq!(is_nested(&ctx, false), levels > 1);
        drop(guards);
        prop_assert_eq!(ctx.depth(), 0);
    }
}

#[test]
fn concurrent_threads_track_depth_independently() {
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..1000 {
                    let levels = thread_id % 4 + 1;
                    let guards: Vec<_> = (0..levels).map(|_| enter(&ThreadContext)).collect();
                    assert_eq!(current_depth(&ThreadContext), levels);
                    drop(guards);
                    assert_eq!(current_depth(&ThreadContext), 0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
