use bazaar_core::{ClientConfig, FavoriteStore, ObjectId};

use crate::commands::common::{format_toggle_outcome, open_storefront};
use crate::error::CliError;

pub async fn run_favorite(config: ClientConfig, object_id: &str) -> Result<(), CliError> {
    let object_id = ObjectId::new(object_id);
    if object_id.as_str().is_empty() {
        return Err(CliError::EmptyObjectId);
    }

    let storefront = open_storefront(config).await?;
    let favorites = FavoriteStore::new(storefront.api, storefront.session);
    let outcome = favorites.toggle(&object_id).await?;
    println!("{}", format_toggle_outcome(&outcome));
    Ok(())
}
