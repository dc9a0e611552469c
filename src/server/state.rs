use crate::places::SitesService;

pub struct AppState {
    pub service: SitesService,
}
