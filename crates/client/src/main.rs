//! `sessiongate` command line client.

use anyhow::{Context, bail};

use sessiongate_client::{ClientApp, ClientConfig, Credentials, Navigation};

const USAGE: &str = "usage: sessiongate <login <identifier> <password> | navigate <path> | explain <path> | logout | whoami>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("invalid configuration")?;
    sessiongate_observability::init_with(config.log_format);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut app = ClientApp::from_config(config).context("failed to build HTTP client")?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["login", identifier, password] => {
            app.start("/").await?;
            let claims = app
                .session
                .login(&Credentials::new(*identifier, *password))
                .await
                .context("login failed")?;
            println!("logged in as {} (id {})", claims.username, claims.id);
            let nav = app.router.navigate("/").await?;
            app.settle().await?;
            print_navigation(&nav);
        }
        ["navigate", path] => {
            app.start("/").await?;
            let nav = app.router.navigate(path).await?;
            app.settle().await?;
            print_navigation(&nav);
            println!("now at {}", app.router.current().path);
        }
        ["explain", path] => {
            app.start("/").await?;
            app.session.check_and_maybe_expire().await;
            let principal = app.session.principal().await;
            let explanation = app.router.guard().explain(path, principal.as_ref());
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
        ["logout"] => {
            app.start("/").await?;
            app.session.logout().await;
            app.settle().await?;
            println!("logged out; now at {}", app.router.current().path);
        }
        ["whoami"] => {
            app.start("/").await?;
            match app.session.claims().await {
                Some(claims) => {
                    let privileges: Vec<&str> = claims.privileges.iter().map(|p| p.as_str()).collect();
                    println!("{} (id {})", claims.username, claims.id);
                    println!("privileges: {}", privileges.join(", "));
                    if let Some(exp) = claims.expires_at() {
                        println!("expires: {}", exp.to_rfc3339());
                    }
                }
                None => println!("anonymous"),
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn print_navigation(nav: &Navigation) {
    match nav {
        Navigation::Completed {
            requested,
            outcome,
            location,
        } => match outcome.redirect() {
            Some(to) => println!("{requested} denied; redirected to {to} (at {})", location.path),
            None => println!("{requested} -> {} [{}]", location.path, location.name),
        },
        Navigation::Cancelled { requested } => println!("{requested} cancelled"),
    }
}
