/// Registers a deferred action on a frame and yields the registration result.
///
/// `defer!(frame, expr)` runs `expr` when the frame exits. Bindings the
/// expression mentions are borrowed, so it sees them as they are at that time.
///
/// `defer!(frame, [a, b] expr)` clones `a` and `b` right away and hands the
/// clones to the action, so `expr` sees the values from the moment of
/// registration no matter what happens to the originals afterwards.
///
/// ```
/// use defer_frame::{defer, Frame};
/// use std::cell::RefCell;
///
/// let seen = RefCell::new(Vec::new());
/// let mut frame: Frame<()> = Frame::new();
/// let mut step = 1;
/// defer!(frame, [step] seen.borrow_mut().push(step)).unwrap();
/// step += 1;
/// defer!(frame, [step] seen.borrow_mut().push(step)).unwrap();
/// frame.return_anonymous(()).unwrap();
/// frame.exit_normal().unwrap();
/// assert_eq!(*seen.borrow(), [2, 1]);
/// ```
#[macro_export]
macro_rules! defer {
    ($frame:expr, [$($arg:ident),* $(,)?] $e:expr) => {
        $frame.defer_with(
            ($(::std::clone::Clone::clone(&$arg),)*),
            |($($arg,)*)| {
                $e;
            },
        )
    };
    ($frame:expr, $e:expr) => {
        $frame.defer(|| {
            $e;
        })
    };
}
