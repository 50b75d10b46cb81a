use std::net::SocketAddr;

use seasons_player::{router, PlayerOriginBuilder};


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "trace")]
    {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    #[allow(unused_mut)]
    let mut builder = PlayerOriginBuilder::from_env().config(aws_config.clone());

    #[cfg(feature = "aws-parameterstore")]
    if let Ok(name) = std::env::var("PLAYER_PASSWORD_PARAMETER") {
        builder = builder.password_from_parameter_store(&aws_config, &name).await?;
    }

    let origin = builder.build()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], get_port()));
    println!("→ Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(origin)).await?;
    Ok(())
}

fn get_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}
