/* This file is part of DePlebs DAO
 *
 * Copyright (C) 2022-2025 DePlebs developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::io::{stdin, stdout, Write};

use ethers::prelude::U256;

use crate::{
    dao::VoteChoice,
    error::{Error, Result},
    Pleb,
};

/// Auxiliary function to print the help message.
fn help() {
    println!("Commands:");
    println!("\thelp: Prints this help message");
    println!("\tinfo: Show DAO membership, treasury and proposal count");
    println!("\tproposals: List all proposals");
    println!("\tproposal <id>: Show a single proposal in detail");
    println!("\tpropose <token-id>: Create a proposal to purchase the given marketplace NFT");
    println!("\tvote <id> <yay|nay>: Vote on an active proposal");
    println!("\texec <id>: Execute a proposal whose deadline has passed");
    println!("\tquit: Exit the shell");
}

/// Run the session as an interactive shell over a single long-lived
/// snapshot. Command failures print an error and return to the prompt;
/// nothing here is fatal to the session.
pub async fn interactive(pleb: &Pleb) -> Result<()> {
    println!("Welcome to the DePlebs DAO interactive shell.");
    help();

    let mut line = String::new();
    loop {
        print!("pleb> ");
        stdout().flush()?;

        line.clear();
        if stdin().read_line(&mut line)? == 0 {
            break
        }

        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else { continue };

        if matches!(cmd, "quit" | "exit") {
            break
        }

        let args: Vec<&str> = words.collect();
        if let Err(e) = dispatch(pleb, cmd, &args).await {
            eprintln!("Error: {e}");
        }
    }

    Ok(())
}

async fn dispatch(pleb: &Pleb, cmd: &str, args: &[&str]) -> Result<()> {
    match cmd {
        "help" => {
            help();
            Ok(())
        }

        "info" => {
            pleb.refresh_dashboard().await;
            pleb.show_dashboard().await
        }

        "proposals" => {
            pleb.refresh_proposal_count().await;
            pleb.refresh_proposals().await;
            pleb.show_proposals().await
        }

        "proposal" => {
            let id = parse_id(args.first(), "Usage: proposal <id>")?;
            pleb.show_proposal(id).await
        }

        "propose" => {
            let token_id = parse_id(args.first(), "Usage: propose <token-id>")?;
            pleb.dao_propose(U256::from(token_id)).await
        }

        "vote" => {
            const USAGE: &str = "Usage: vote <id> <yay|nay>";
            let id = parse_id(args.first(), USAGE)?;
            let choice: VoteChoice = args.get(1).ok_or(Error::ParseFailed(USAGE))?.parse()?;
            pleb.dao_vote(id, choice).await
        }

        "exec" => {
            let id = parse_id(args.first(), "Usage: exec <id>")?;
            pleb.dao_exec(id).await
        }

        _ => {
            eprintln!("Unknown command: {cmd}");
            help();
            Ok(())
        }
    }
}

/// Auxiliary function to parse a numeric shell argument.
fn parse_id(arg: Option<&&str>, usage: &'static str) -> Result<u64> {
    let Some(arg) = arg else { return Err(Error::ParseFailed(usage)) };
    Ok(arg.parse()?)
}
