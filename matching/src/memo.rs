use parking_lot::{Condvar, Mutex};

enum State<T, E> {
    Uncomputed,
    Computing,
    Ready(T),
    Failed(E),
}

/// A value computed at most once, even under concurrent first access.
///
/// The first caller runs the computation while later callers block on the
/// condition variable and then share its outcome. A failure is terminal.
/// If the computation panics the cell returns to `Uncomputed` so that a
/// waiter can take over.
pub(crate) struct Memo<T, E> {
    state: Mutex<State<T, E>>,
    changed: Condvar,
}

impl<T: Clone, E: Clone> Memo<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::Uncomputed),
            changed: Condvar::new(),
        }
    }

    /// Returns the cached outcome, computing it with `compute` if no other
    /// caller has done so or is doing so.
    pub(crate) fn get_or_try_init<F>(&self, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Ready(v) => return Ok(v.clone()),
                State::Failed(e) => return Err(e.clone()),
                State::Uncomputed => break,
                State::Computing => {}
            }
            self.changed.wait(&mut state);
        }
        *state = State::Computing;
        drop(state);

        let mut guard = UnwindGuard { memo: self, armed: true };
        let result = compute();
        guard.armed = false;

        let mut state = self.state.lock();
        *state = match &result {
            Ok(v) => State::Ready(v.clone()),
            Err(e) => State::Failed(e.clone()),
        };
        self.changed.notify_all();
        result
    }

    /// Returns the outcome if the computation has finished.
    pub(crate) fn peek(&self) -> Option<Result<T, E>> {
        match &*self.state.lock() {
            State::Ready(v) => Some(Ok(v.clone())),
            State::Failed(e) => Some(Err(e.clone())),
            State::Uncomputed | State::Computing => None,
        }
    }
}

struct UnwindGuard<'a, T, E> {
    memo: &'a Memo<T, E>,
    armed: bool,
}

impl<T, E> Drop for UnwindGuard<'_, T, E> {
    fn drop(&mut self) {
        if self.armed {
            *self.memo.state.lock() = State::Uncomputed;
            self.memo.changed.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn computes_once() {
        let memo: Memo<u32, String> = Memo::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = memo.get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            });
            assert_eq!(v, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.peek(), Some(Ok(7)));
    }

    #[test]
    fn failure_is_cached() {
        let memo: Memo<u32, String> = Memo::new();
        assert!(memo.peek().is_none());
        assert_eq!(memo.get_or_try_init(|| Err("boom".to_string())), Err("boom".to_string()));
        assert_eq!(memo.get_or_try_init(|| Ok(1)), Err("boom".to_string()));
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        let memo: Arc<Memo<u32, String>> = Arc::new(Memo::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    memo.get_or_try_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(42)
                    })
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_resets_state() {
        let memo: Arc<Memo<u32, String>> = Arc::new(Memo::new());
        let m = Arc::clone(&memo);
        let res = thread::spawn(move || m.get_or_try_init(|| panic!("engine crashed"))).join();
        assert!(res.is_err());
        assert!(memo.peek().is_none());
        assert_eq!(memo.get_or_try_init(|| Ok(3)), Ok(3));
    }
}
