//! Cart scripts.
//!
//! One command per line; `#` starts a comment. A trailing `&` runs a cart
//! mutation in the background so several confirmations can be in flight.
//! Foreground `update` and `remove` press the panel's line controls, which
//! refuse input while a confirmation is pending; background ones call the
//! store directly.
//!
//! ```text
//! add 1 2 &
//! update 1 5
//! wait
//! show
//! ```

use std::io::Read as _;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use tokio::task::JoinSet;
use turbo_cart::prelude::*;

use super::RunArgs;
use crate::context::Context;
use crate::session::{Session, VIEWPORT_WIDTH};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Add { id: String, quantity: i64 },
    Update { id: String, quantity: i64 },
    Remove { id: String },
    Open,
    Close,
    ClickInside,
    ClickOutside,
    ViewCart,
    Wait(Option<u64>),
    Show,
    Clear,
    Login(String),
    Logout,
    Reject(String),
    Offline(bool),
}

impl Command {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Add { .. } | Command::Update { .. } | Command::Remove { .. }
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Line {
    command: Command,
    background: bool,
}

fn parse_line(raw: &str) -> Result<Option<Line>> {
    let text = raw.split('#').next().unwrap_or_default().trim();
    if text.is_empty() {
        return Ok(None);
    }
    let (text, background) = match text.strip_suffix('&') {
        Some(rest) => (rest.trim_end(), true),
        None => (text, false),
    };

    let mut words = text.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let arg = |i: usize, what: &str| -> Result<String> {
        args.get(i)
            .map(|s| s.to_string())
            .with_context(|| format!("'{}' needs {}", verb, what))
    };

    let command = match verb {
        "add" => Command::Add {
            id: arg(0, "a product id")?,
            quantity: match args.get(1) {
                Some(q) => parse_quantity_input(q)?,
                None => 1,
            },
        },
        "update" => Command::Update {
            id: arg(0, "a product id")?,
            quantity: arg(1, "a quantity")?
                .parse::<i64>()
                .with_context(|| format!("'{}' is not a quantity", args[1]))?,
        },
        "remove" => Command::Remove {
            id: arg(0, "a product id")?,
        },
        "open" => Command::Open,
        "close" => Command::Close,
        "click-inside" => Command::ClickInside,
        "click-outside" => Command::ClickOutside,
        "view-cart" => Command::ViewCart,
        "wait" => Command::Wait(match args.first() {
            Some(ms) => Some(
                ms.parse::<u64>()
                    .with_context(|| format!("'{}' is not milliseconds", ms))?,
            ),
            None => None,
        }),
        "show" => Command::Show,
        "clear" => Command::Clear,
        "login" => Command::Login(arg(0, "a user id")?),
        "logout" => Command::Logout,
        "reject" => Command::Reject(arg(0, "a product id")?),
        "offline" => Command::Offline(match args.first().copied() {
            None | Some("on") => true,
            Some("off") => false,
            Some(other) => bail!("'offline' takes on or off, got '{}'", other),
        }),
        other => bail!("Unknown command '{}'", other),
    };

    if background && !command.is_mutation() {
        bail!("only add, update and remove can run in the background");
    }
    Ok(Some(Line {
        command,
        background,
    }))
}

fn parse_script(source: &str) -> Result<Vec<(usize, Line)>> {
    let mut lines = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let number = i + 1;
        if let Some(line) = parse_line(raw).with_context(|| format!("line {}", number))? {
            lines.push((number, line));
        }
    }
    Ok(lines)
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let source = if args.script == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read script from stdin")?;
        buf
    } else {
        let path = ctx.resolve_path(&args.script);
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    let script = parse_script(&source)?;

    let session = Session::new(&ctx.config, Duration::from_millis(args.latency_ms), &ctx.output)?;
    for id in &args.reject {
        session.remote.reject(id.as_str());
    }
    let driver = session.cart.spawn_panel_driver();
    let mut background = JoinSet::new();
    let mut failures = 0;

    for (number, line) in script {
        ctx.output.debug(&format!("{:>3}: {:?}", number, line.command));
        let result = if line.background {
            spawn(&session, line.command, &mut background).await
        } else {
            execute(&session, line.command, &mut background).await
        };
        if let Err(e) = result {
            failures += 1;
            ctx.output.error(&format!("line {}: {:#}", number, e));
            if args.fail_fast {
                break;
            }
        }
    }

    while let Some(joined) = background.join_next().await {
        if let Err(e) = joined.context("background task panicked")? {
            failures += 1;
            ctx.output.error(&format!("{:#}", e));
        }
    }
    driver.abort();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "items": session.cart.store().items(),
            "visibility": session.cart.visibility().get(),
            "events": session.log.events(),
        }));
    }

    if failures > 0 {
        bail!("{} command(s) failed", failures);
    }
    Ok(())
}

async fn spawn(
    session: &Session,
    command: Command,
    background: &mut JoinSet<Result<()>>,
) -> Result<()> {
    let cart = session.cart.clone();
    let product = match &command {
        Command::Add { id, .. } => Some(session.product(id).await?),
        _ => None,
    };
    background.spawn(async move { mutate(&cart, command, product.as_ref(), false).await });
    // Let the mutation apply locally before the next line runs.
    tokio::task::yield_now().await;
    Ok(())
}

async fn mutate(
    cart: &CartContext,
    command: Command,
    product: Option<&Product>,
    via_panel: bool,
) -> Result<()> {
    match (command, product) {
        (Command::Add { quantity, .. }, Some(product)) => {
            cart.add_to_cart(product, quantity, VIEWPORT_WIDTH).await?
        }
        (Command::Update { id, quantity }, _) => {
            let id = ProductId::new(id);
            if via_panel {
                cart.panel().change_quantity(&id, quantity).await?
            } else {
                cart.store().update_quantity(&id, quantity).await?
            }
        }
        (Command::Remove { id }, _) => {
            let id = ProductId::new(id);
            if via_panel {
                cart.panel().remove_line(&id).await?
            } else {
                cart.store().remove_item(&id).await
            }
        }
        (other, _) => bail!("{:?} is not a cart mutation", other),
    }
    Ok(())
}

async fn execute(
    session: &Session,
    command: Command,
    background: &mut JoinSet<Result<()>>,
) -> Result<()> {
    let cart = &session.cart;
    match command {
        Command::Add { id, quantity } => {
            let product = session.product(&id).await?;
            cart.add_to_cart(&product, quantity, VIEWPORT_WIDTH).await?;
        }
        Command::Update { .. } | Command::Remove { .. } => mutate(cart, command, None, true).await?,
        Command::Open => cart.open_cart(),
        Command::Close => cart.close_cart(),
        Command::ClickInside => {
            session.click_inside();
        }
        Command::ClickOutside => {
            session.click_outside();
        }
        Command::ViewCart => cart.panel().view_cart(),
        Command::Wait(Some(ms)) => tokio::time::sleep(Duration::from_millis(ms)).await,
        Command::Wait(None) => {
            while let Some(joined) = background.join_next().await {
                joined.context("background task panicked")??;
            }
            session.settle().await?;
        }
        Command::Show => session.print_state(),
        Command::Clear => cart.store().clear(),
        Command::Login(user) => cart.on_login(CartOwner::User(UserId::new(user))),
        Command::Logout => cart.on_logout(),
        Command::Reject(id) => session.remote.reject(id.as_str()),
        Command::Offline(offline) => session.remote.set_offline(offline),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let script = "\
# warm up
add 1 2 &
update 1 0
remove gift-card   # trailing comment
wait
wait 250
offline off
";
        let lines = parse_script(script).unwrap();
        let commands: Vec<_> = lines.iter().map(|(_, l)| l.command.clone()).collect();
        assert_eq!(
            commands,
            vec![
                Command::Add {
                    id: "1".into(),
                    quantity: 2
                },
                Command::Update {
                    id: "1".into(),
                    quantity: 0
                },
                Command::Remove {
                    id: "gift-card".into()
                },
                Command::Wait(None),
                Command::Wait(Some(250)),
                Command::Offline(false),
            ]
        );
        assert!(lines[0].1.background);
        assert_eq!(lines[0].0, 2);
    }

    #[test]
    fn test_add_defaults_to_one() {
        let line = parse_line("add 3").unwrap().unwrap();
        assert_eq!(
            line.command,
            Command::Add {
                id: "3".into(),
                quantity: 1
            }
        );
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!(parse_line("add").is_err());
        assert!(parse_line("add 1 zero").is_err());
        assert!(parse_line("add 1 0").is_err());
        assert!(parse_line("update 1").is_err());
        assert!(parse_line("open &").is_err());
        assert!(parse_line("dance").is_err());
    }
}
