use crate::{
    config::Config,
    error::AppResult,
    infrastructure::connect_store,
    services::ScheduleService,
};

#[derive(Clone)]
pub struct AppState {
    pub schedule_service: ScheduleService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        // Store is chosen by the DATABASE_URL scheme and its schema created here
        let store = connect_store(&config.database).await?;
        let schedule_service = ScheduleService::new(store);

        Ok(Self {
            schedule_service,
            config,
        })
    }
}
