use anyhow::Context;

use crate::config::config;

pub fn handle(password: &str) -> anyhow::Result<()> {
    let cost = config().security.password_hash_cost;
    let hash = bcrypt::hash(password, cost).context("failed to hash password")?;
    println!("{hash}");
    Ok(())
}
