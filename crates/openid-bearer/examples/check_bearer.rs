//! Authenticate one Authorization header against a live provider
//!
//! Reads the configuration from `OIDC_BEARER_*` variables and runs the JWT
//! strategy, then the userinfo strategy, the way a host framework would.
//!
//! ```text
//! OIDC_BEARER_METADATA_URL=https://idp.example/.well-known/openid-configuration \
//!     cargo run --example check_bearer -- "Bearer eyJhbGciOi..."
//! ```

use openid_bearer::{
    BearerConfig, Claims, JwtBearerStrategy, Outcome, RequestRef, StrategyRegistry,
    UserinfoBearerStrategy, configure,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let authorization = std::env::args()
        .nth(1)
        .ok_or("usage: check_bearer '<Authorization header value>'")?;

    configure(BearerConfig::from_env()?)?;

    let mut registry: StrategyRegistry<Claims> = StrategyRegistry::new();
    registry.register("oidc_jwt", Arc::new(JwtBearerStrategy::from_global()?))?;
    registry.register("oidc_userinfo", Arc::new(UserinfoBearerStrategy::from_global()?))?;

    let request: RequestRef = Arc::new(
        http::Request::builder()
            .header("Authorization", authorization)
            .body(())?,
    );

    match registry.run(&["oidc_jwt", "oidc_userinfo"], &request).await? {
        Outcome::Success(claims) => {
            println!("Authenticated: {}", serde_json::to_string_pretty(&claims)?);
        }
        Outcome::Failure(error) => println!("401 Unauthorized: {error}"),
        Outcome::Decline => println!("No bearer token; another strategy would have to decide"),
    }

    Ok(())
}
