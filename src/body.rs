//! Step bodies
//!
//! A body keeps the author-supplied source separately from the callable that the
//! execution adapter drives, so reporting never sees adapter internals.

use std::borrow::Cow;
use std::fmt;

use futures_util::future::LocalBoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Result of a step body
pub type StepResult = eyre::Result<()>;

type SyncFn<W> = Box<dyn Fn(&mut W) -> StepResult>;
type FutureFn<W> = Box<dyn for<'a> Fn(&'a mut W) -> LocalBoxFuture<'a, StepResult>>;
type CallbackFn<W> = Box<dyn Fn(&mut W, Done)>;

/// The three calling conventions a step body may use
pub(crate) enum Executable<W> {
    /// Returns when finished
    Sync(SyncFn<W>),
    /// Returns a future that settles when finished
    Future(FutureFn<W>),
    /// Signals completion through a [`Done`] handle
    Callback(CallbackFn<W>),
}

impl<W> Executable<W> {
    fn convention(&self) -> &'static str {
        match self {
            Executable::Sync(_) => "sync",
            Executable::Future(_) => "future",
            Executable::Callback(_) => "callback",
        }
    }
}

/// What reporting tools see when they inspect a step's body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyView<'a> {
    /// The author's source
    Authored(&'a str),
    /// The execution adapter is currently driving the body
    Adapter,
}

/// Executable body of a step plus its authored source
pub struct Body<W> {
    display: Cow<'static, str>,
    pub(crate) exec: Executable<W>,
    wrapped: bool,
}

impl<W> Body<W> {
    fn new<F>(exec: Executable<W>) -> Self {
        Self {
            display: Cow::Borrowed(std::any::type_name::<F>()),
            exec,
            wrapped: false,
        }
    }

    /// A body that finishes when it returns
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&mut W) -> StepResult + 'static,
    {
        Self::new::<F>(Executable::Sync(Box::new(f)))
    }

    /// A body that returns a future
    pub fn future<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut W) -> LocalBoxFuture<'a, StepResult> + 'static,
    {
        Self::new::<F>(Executable::Future(Box::new(f)))
    }

    /// A body that reports completion through a [`Done`] handle
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&mut W, Done) + 'static,
    {
        Self::new::<F>(Executable::Callback(Box::new(f)))
    }

    /// Attach the author's source text (see the [`sourced!`](crate::sourced) macro)
    pub fn with_source(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.display = source.into();
        self
    }

    /// Authored source
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Name of the calling convention
    pub fn convention(&self) -> &'static str {
        self.exec.convention()
    }

    /// What reporting currently sees
    pub fn view(&self) -> BodyView<'_> {
        if self.wrapped {
            BodyView::Adapter
        } else {
            BodyView::Authored(&self.display)
        }
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub(crate) fn wrap(&mut self) {
        self.wrapped = true;
    }

    /// Show the authored body again. Returns whether anything changed.
    pub fn restore(&mut self) -> bool {
        std::mem::replace(&mut self.wrapped, false)
    }
}

impl<W> fmt::Debug for Body<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("display", &self.display)
            .field("convention", &self.convention())
            .field("wrapped", &self.wrapped)
            .finish()
    }
}

/// Conversion of closures and prepared bodies into a [`Body`]
///
/// Plain closures become synchronous bodies.
pub trait IntoBody<W> {
    fn into_body(self) -> Body<W>;
}

impl<W> IntoBody<W> for Body<W> {
    fn into_body(self) -> Body<W> {
        self
    }
}

impl<W, F> IntoBody<W> for F
where
    F: Fn(&mut W) -> StepResult + 'static,
{
    fn into_body(self) -> Body<W> {
        Body::sync(self)
    }
}

/// Build a [`Body`] that remembers the closure's source text
///
/// ```ignore
/// scenario.given("a user", sourced!(sync |w: &mut World| { w.user = Some(1); Ok(()) }));
/// ```
#[macro_export]
macro_rules! sourced {
    (sync $f:expr) => {
        $crate::body::Body::sync($f).with_source(stringify!($f))
    };
    (future $f:expr) => {
        $crate::body::Body::future($f).with_source(stringify!($f))
    };
    (callback $f:expr) => {
        $crate::body::Body::callback($f).with_source(stringify!($f))
    };
}

/// Raises failures for an in-flight callback step from outside its call stack
///
/// Clones can be moved into spawned tasks. Once the step has completed, raised
/// failures are dropped instead of being attributed to a later step.
#[derive(Debug, Clone)]
pub struct FailureToken {
    tx: mpsc::UnboundedSender<eyre::Report>,
}

impl FailureToken {
    /// Report a failure. Returns `false` if the step already completed.
    pub fn raise(&self, err: impl Into<eyre::Report>) -> bool {
        let delivered = self.tx.send(err.into()).is_ok();
        if !delivered {
            debug!("failure raised after step completion was ignored");
        }
        delivered
    }

    pub fn is_active(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Completion handle handed to callback-style bodies
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<StepResult>,
    token: FailureToken,
}

impl Done {
    pub(crate) fn channel() -> (
        Self,
        oneshot::Receiver<StepResult>,
        mpsc::UnboundedReceiver<eyre::Report>,
    ) {
        let (tx, done_rx) = oneshot::channel();
        let (fail_tx, fail_rx) = mpsc::unbounded_channel();
        let done = Self {
            tx,
            token: FailureToken { tx: fail_tx },
        };
        (done, done_rx, fail_rx)
    }

    /// A token for raising failures from other tasks
    pub fn token(&self) -> FailureToken {
        self.token.clone()
    }

    /// Complete the step successfully
    pub fn ok(self) {
        self.complete(Ok(()));
    }

    /// Complete the step with a failure
    pub fn fail(self, err: impl Into<eyre::Report>) {
        self.complete(Err(err.into()));
    }

    pub fn complete(self, result: StepResult) {
        if self.tx.send(result).is_err() {
            debug!("completion signalled after step finished was ignored");
        }
    }
}
