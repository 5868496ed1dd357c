#[derive(Debug)]
pub enum Command {
    Serve,
    Route { id: String, shards: usize },
}

pub fn parse_command() -> anyhow::Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Serve);
    }

    match args[1].as_str() {
        "serve" => Ok(Command::Serve),
        "route" => parse_route(&args[2..]),
        _ => Ok(Command::Serve),
    }
}

/// `vexel route --id <id> [--shards N]` prints which shard an id lands on.
/// Handy when poking a live deployment by hand.
fn parse_route(args: &[String]) -> anyhow::Result<Command> {
    let mut id = None;
    let mut shards = 3usize;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--id" => {
                id = Some(
                    iter.next()
                        .ok_or_else(|| anyhow::anyhow!("--id requires a value"))?
                        .to_string(),
                );
            }
            "--shards" => {
                shards = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--shards requires a value"))?
                    .parse()?;
            }
            _ => {}
        }
    }
    let id = id.ok_or_else(|| anyhow::anyhow!("route requires --id"))?;
    Ok(Command::Route { id, shards })
}
