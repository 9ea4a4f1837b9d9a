use anyhow::Result;
use authgen_config::Settings;
use authgen_envoy::PolicyCompiler;
use authgen_oidc::NetworkTarget;
use colored::Colorize;

pub async fn resolve(settings: &Settings, uri: &str) -> Result<()> {
    let compiler = PolicyCompiler::from_settings(settings)?;
    let endpoints = compiler.resolver().resolve(uri).await?;
    let target = NetworkTarget::derive(&endpoints.token_endpoint, uri.trim())?;

    println!("{}: {}", "Authorize".cyan(), endpoints.authorize_endpoint);
    println!("{}: {}", "Token".cyan(), endpoints.token_endpoint);
    println!(
        "{}: {}",
        "End session".cyan(),
        endpoints.end_session_endpoint.as_deref().unwrap_or("(none)")
    );
    println!(
        "{}: {} ({})",
        "Target".cyan(),
        target,
        if target.tls { "tls".green() } else { "plaintext".yellow() }
    );
    Ok(())
}
