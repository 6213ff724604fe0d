use std::borrow::Cow;

/// Common span attribute names.
pub struct SpanAttribute;

impl SpanAttribute {
    pub const EXCEPTION_MESSAGE: &'static str = "exception.message";
    pub const RUN_SEED: &'static str = "run.seed";
    pub const RUN_OUTPUT_DIRECTORY: &'static str = "run.output_directory";
    pub const DATASET_ID: &'static str = "dataset.id";
    pub const DATASET_TASK: &'static str = "dataset.task";
    pub const WORKER_CONFIGURATION_ID: &'static str = "worker.configuration_id";
    pub const WORKER_STATUS: &'static str = "worker.status";
    pub const WORKER_EXIT: &'static str = "worker.exit";
    pub const DISPATCH_CANDIDATES: &'static str = "dispatch.candidates";
    pub const DISPATCH_CONCURRENCY: &'static str = "dispatch.concurrency";
    pub const DISPATCH_TIME_BUDGET: &'static str = "dispatch.time_budget";
}

/// An object that can be associated with a tracing span.
pub trait SpanAssociation {
    /// The name of the object associated with the span.
    fn name(&self) -> Cow<'static, str>;

    /// The properties of the object associated with the span.
    fn properties(&self) -> impl IntoIterator<Item = (Cow<'static, str>, Cow<'static, str>)>;
}

/// Environment variables used to propagate the trace context to worker processes.
pub struct ContextPropagationEnv;

impl ContextPropagationEnv {
    pub const TRACEPARENT: &'static str = "AUTOML_TRACEPARENT";
}
