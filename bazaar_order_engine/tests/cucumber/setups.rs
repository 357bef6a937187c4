use cucumber::given;

use crate::{cucumber::MarketplaceWorld, support::Harness};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketplaceWorld) {
    world.system = Some(Harness::new().await);
}
