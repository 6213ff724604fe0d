#[derive(Debug, Clone, Default)]
pub struct WorkerLaunchOptions {
    pub w3c_traceparent: Option<String>,
}
