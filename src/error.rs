pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("input error: {0}")]
    Input(String),

    /// A partition bound, cursor or slot was violated. Always a defect.
    #[error("schedule error: {0}")]
    Schedule(String),

    #[error("accelerator error: {0}")]
    Accelerator(String),

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error("task {task} failed: {reason}")]
    TaskFailed { task: usize, reason: String },

    #[error("verification failed: {0}")]
    Verification(String),

    #[cfg(feature = "gpu")]
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn input<S: Into<String>>(msg: S) -> Self {
        Error::Input(msg.into())
    }

    pub fn schedule<S: Into<String>>(msg: S) -> Self {
        Error::Schedule(msg.into())
    }

    pub fn accelerator<S: Into<String>>(msg: S) -> Self {
        Error::Accelerator(msg.into())
    }

    pub fn task_failed<S: Into<String>>(task: usize, reason: S) -> Self {
        Error::TaskFailed {
            task,
            reason: reason.into(),
        }
    }

    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Error::Verification(msg.into())
    }

    #[cfg(feature = "gpu")]
    pub fn gpu<S: Into<String>>(msg: S) -> Self {
        Error::Gpu(msg.into())
    }

    #[cfg(feature = "telemetry")]
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Other(format!("telemetry: {}", msg.into()))
    }

    /// True for errors that indicate a scheduling defect rather than a bad
    /// environment or input.
    pub fn is_schedule_defect(&self) -> bool {
        matches!(self, Error::Schedule(_))
    }
}
