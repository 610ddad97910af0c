#[cfg(target_arch = "wasm32")]
fn main() {
    agent_mission::web::mount();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use std::io;
    use std::process::ExitCode;
    use std::time::{SystemTime, UNIX_EPOCH};

    use agent_mission::logging::{self, StderrSink};
    use agent_mission::{
        Catalog, CompletionGate, FileStore, LogDispatcher, MissionConfig, MissionController,
        terminal,
    };
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MISSION_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    logging::init(StderrSink, filter);

    let config = match std::env::var("MISSION_CONFIG") {
        Ok(path) => match MissionConfig::from_file(&path) {
            Ok(config) => config,
            Err(error) => {
                tracing::error!(%error, "configuration could not be loaded");
                return ExitCode::FAILURE;
            }
        },
        Err(_) => MissionConfig::default(),
    };

    let catalog = match std::env::var("MISSION_CATALOG") {
        Ok(path) => Catalog::from_file(path),
        Err(_) => Catalog::builtin(),
    };
    let catalog = match catalog {
        Ok(catalog) => catalog,
        Err(error) => {
            tracing::error!(%error, "stage catalog could not be loaded");
            return ExitCode::FAILURE;
        }
    };

    let state_path =
        std::env::var("MISSION_STATE").unwrap_or_else(|_| ".mission-state.json".to_string());
    let store = FileStore::new(state_path);
    tracing::debug!(path = %store.path().display(), "completion state file");
    let gate = CompletionGate::new(store, config.completion_key);
    let mut controller = MissionController::new(catalog, gate, LogDispatcher);

    let clock = || {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    };

    match terminal::run(&mut controller, io::stdin().lock(), io::stdout().lock(), clock) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "terminal session failed");
            ExitCode::FAILURE
        }
    }
}
