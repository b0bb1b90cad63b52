use cucumber::given;
use payment_engine::SettlementError;

use crate::cucumber::{gateway_world::GatewaySystem, GatewayWorld};

#[given("a fresh gateway")]
async fn fresh_gateway(world: &mut GatewayWorld) {
    world.system = Some(GatewaySystem::new());
}

#[given(expr = "merchant {string} with password {string} and a rate budget of {int} per second")]
async fn add_merchant(world: &mut GatewayWorld, username: String, password: String, rate: i32) {
    let name = format!("{username} Trading Co.");
    world.system().merchants.add_merchant(&username, &password, &name, rate).await;
    world.passwords.insert(username, password);
}

#[given("the merchant service is unreachable")]
async fn merchants_unreachable(world: &mut GatewayWorld) {
    world.system().merchants.set_unreachable(true).await;
}

#[given(expr = "the bank accepts the next charge with reference {word}")]
async fn bank_accepts(world: &mut GatewayWorld, label: String) {
    let reference = world.reference(&label);
    world.system().bank.accept_with(reference, "processing").await;
}

#[given(expr = "the bank declines the next charge with message {string}")]
async fn bank_declines(world: &mut GatewayWorld, message: String) {
    world.system().bank.fail_with(SettlementError::Declined { message }).await;
}

#[given("the bank is unreachable for the next charge")]
async fn bank_unreachable(world: &mut GatewayWorld) {
    let err = SettlementError::Transport("connection reset by peer".into());
    world.system().bank.fail_with(err).await;
}
