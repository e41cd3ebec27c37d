mod reconcile;
mod refresh;
mod seasons;
mod stale;

pub use reconcile::cmd_reconcile;
pub use refresh::cmd_refresh;
pub use seasons::{cmd_list_seasons, cmd_update_all, cmd_update_season};
pub use stale::cmd_stale;
