pub mod edge;
pub mod server;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Edge(edge::Args),
}

impl Action {
    /// # Errors
    /// Returns an error if the selected service fails to start or stops abnormally.
    pub async fn execute(self) -> Result<()> {
        let result = match self {
            Self::Server(args) => server::execute(args).await,
            Self::Edge(args) => edge::execute(args).await,
        };
        crate::cli::telemetry::shutdown_tracer();
        result
    }
}
