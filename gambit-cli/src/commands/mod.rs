use anyhow::{anyhow, bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use gambit_core::{Amount, Custody, MemoryBank, PlayerId, ProtocolConfig, SystemClock};
use gambit_protocol::{
    compute_digest, generate_nonce, GameRegistry, GameType, RoundResult, SessionView,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reserved account name backing the protocol treasury.
const TREASURY: &str = "treasury";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LocalLedger {
    accounts: HashMap<String, AccountData>, // name -> account
    secrets: HashMap<String, SecretData>,   // "game_id:player_name" -> move secret
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountData {
    id: PlayerId,
    balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretData {
    value: u64,
    nonce: u64,
}

fn ledger_path(data_dir: &Path) -> PathBuf {
    data_dir.join("ledger.json")
}

fn load_ledger(data_dir: &Path) -> Result<LocalLedger> {
    let path = ledger_path(data_dir);
    if !path.exists() {
        return Ok(LocalLedger::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn save_ledger(data_dir: &Path, ledger: &LocalLedger) -> Result<()> {
    let content = serde_json::to_string_pretty(ledger)?;
    std::fs::write(ledger_path(data_dir), content)?;
    Ok(())
}

struct Env {
    registry: GameRegistry,
    bank: Arc<MemoryBank>,
    ledger: LocalLedger,
}

impl Env {
    /// Rebuilds the bank and registry from local state.
    async fn open(data_dir: &Path) -> Result<Self> {
        let mut ledger = load_ledger(data_dir)?;

        let treasury_is_new = !ledger.accounts.contains_key(TREASURY);
        let treasury = ledger
            .accounts
            .entry(TREASURY.to_string())
            .or_insert_with(|| AccountData {
                id: PlayerId::new_v4(),
                balance: Amount::ZERO,
            })
            .id;
        if treasury_is_new {
            // The treasury identity must survive restarts.
            save_ledger(data_dir, &ledger)?;
        }

        let bank = Arc::new(MemoryBank::new());
        for account in ledger.accounts.values() {
            bank.open_account(account.id, account.balance)?;
        }

        let config = ProtocolConfig::with_treasury(treasury);
        let registry =
            GameRegistry::open(config, bank.clone(), Arc::new(SystemClock), data_dir).await?;
        // Active sessions hold funds that are not in any account balance.
        bank.restore_escrow(registry.escrowed_total());

        Ok(Self {
            registry,
            bank,
            ledger,
        })
    }

    fn account(&self, name: &str) -> Result<&AccountData> {
        self.ledger
            .accounts
            .get(name)
            .ok_or_else(|| anyhow!("unknown player '{}', register first", name))
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.ledger
            .accounts
            .iter()
            .find(|(_, account)| account.id == id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Writes bank balances back to the JSON ledger.
    fn sync_and_save(&mut self, data_dir: &Path) -> Result<()> {
        for account in self.ledger.accounts.values_mut() {
            account.balance = self.bank.balance(account.id)?;
        }
        save_ledger(data_dir, &self.ledger)
    }
}

pub async fn register(data_dir: &Path, name: &str, funds: &str) -> Result<()> {
    if name == TREASURY {
        bail!("'{}' is a reserved account name", TREASURY);
    }
    let funds: Amount = funds.parse().map_err(|e: String| anyhow!(e))?;

    let mut env = Env::open(data_dir).await?;
    if env.ledger.accounts.contains_key(name) {
        bail!("player '{}' already exists", name);
    }
    env.ledger.accounts.insert(
        name.to_string(),
        AccountData {
            id: PlayerId::new_v4(),
            balance: funds,
        },
    );
    save_ledger(data_dir, &env.ledger)?;

    println!("Registered player '{}' with balance {}", name, funds);
    Ok(())
}

pub async fn create_game(data_dir: &Path, player: &str, game_type: &str) -> Result<()> {
    let game_type: GameType = game_type.parse().map_err(|e: String| anyhow!(e))?;

    let mut env = Env::open(data_dir).await?;
    let creator = env.account(player)?.id;
    let stake = env.registry.config().stake;

    let game_id = env.registry.create_game(game_type, creator, stake).await?;
    env.sync_and_save(data_dir)?;

    println!("Created game {} ({})", game_id, game_type);
    println!("Stake: {} (escrowed)", stake);
    println!("Waiting for a second player: gambit join <player> {}", game_id);
    Ok(())
}

pub async fn join_game(data_dir: &Path, player: &str, game_id: u64) -> Result<()> {
    let mut env = Env::open(data_dir).await?;
    let joiner = env.account(player)?.id;
    let stake = env.registry.config().stake;

    env.registry.join_game(game_id, joiner, stake).await?;
    env.sync_and_save(data_dir)?;

    println!("Joined game {} with stake {}", game_id, stake);
    println!("Both players can now commit: gambit commit <player> {} <move>", game_id);
    Ok(())
}

pub async fn commit_move(data_dir: &Path, player: &str, game_id: u64, value: u64) -> Result<()> {
    let mut env = Env::open(data_dir).await?;
    let player_id = env.account(player)?.id;

    let nonce = generate_nonce();
    let digest = compute_digest(value, nonce, player_id);
    env.registry
        .commit_move(game_id, player_id, digest.clone())
        .await?;

    // Keep the secret locally so the reveal can be replayed later.
    let secret_key = format!("{}:{}", game_id, player);
    env.ledger
        .secrets
        .insert(secret_key, SecretData { value, nonce });
    env.sync_and_save(data_dir)?;

    println!("Commitment submitted for game {}", game_id);
    println!("Digest: {}", digest);
    println!("Reveal once your opponent has committed: gambit reveal {} {}", player, game_id);
    Ok(())
}

pub async fn reveal_move(data_dir: &Path, player: &str, game_id: u64) -> Result<()> {
    let mut env = Env::open(data_dir).await?;
    let player_id = env.account(player)?.id;

    let secret_key = format!("{}:{}", game_id, player);
    let secret = env
        .ledger
        .secrets
        .get(&secret_key)
        .cloned()
        .ok_or_else(|| anyhow!("no stored commitment for '{}' in game {}", player, game_id))?;

    let result = env
        .registry
        .reveal_move(game_id, player_id, secret.value, secret.nonce)
        .await?;
    env.ledger.secrets.remove(&secret_key);
    env.sync_and_save(data_dir)?;

    println!("Move revealed for game {}", game_id);
    match result {
        RoundResult::AwaitingOpponent => println!("Waiting for the other player to reveal..."),
        RoundResult::NextRound => {
            let view = SessionView::from(&env.registry.get_game(game_id).await?);
            println!("No decision yet; game continues into round {}", view.round);
        }
        RoundResult::Finished { winner } => {
            println!();
            println!("------ GAME FINISHED ------");
            match winner {
                Some(w) => println!("Winner: {}", env.name_of(w)),
                None => println!("Draw; stakes refunded minus the fee"),
            }
            let view = SessionView::from(&env.registry.get_game(game_id).await?);
            for payout in &view.payouts {
                println!(
                    "Paid {} to {} ({:?})",
                    payout.amount,
                    env.name_of(payout.account),
                    payout.reason
                );
            }
        }
    }
    Ok(())
}

pub async fn expire_game(data_dir: &Path, game_id: u64, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Force-expire game {}?", game_id))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut env = Env::open(data_dir).await?;
    env.registry.expire_game(game_id).await?;
    env.sync_and_save(data_dir)?;

    println!("Game {} expired", game_id);
    let view = SessionView::from(&env.registry.get_game(game_id).await?);
    for payout in &view.payouts {
        println!(
            "Paid {} to {} ({:?})",
            payout.amount,
            env.name_of(payout.account),
            payout.reason
        );
    }
    Ok(())
}

pub async fn show_game_status(data_dir: &Path, game_id: u64) -> Result<()> {
    let env = Env::open(data_dir).await?;
    let view = SessionView::from(&env.registry.get_game(game_id).await?);

    println!("Game {}: {}", view.id, view.game_type);
    println!("═══════════════════════════════════");
    println!("State: {}", view.state);
    println!("Stake: {} per player", view.stake);
    println!("Round: {}", view.round);
    println!("Created: {}", view.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Last action: {}",
        view.last_action_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(winner) = view.winner {
        println!("Winner: {}", env.name_of(winner));
    }
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Player", "Committed", "Revealed", "Position"]);

    for (player, position) in &view.positions {
        table.add_row(vec![
            env.name_of(*player),
            view.committed.contains(player).to_string(),
            view.revealed.contains(player).to_string(),
            position.to_string(),
        ]);
    }
    println!("{}", table);

    if !view.payouts.is_empty() {
        println!();
        println!("Payouts:");
        let mut payout_table = Table::new();
        payout_table.load_preset(UTF8_FULL);
        payout_table.set_header(vec!["Account", "Amount", "Reason"]);
        for payout in &view.payouts {
            payout_table.add_row(vec![
                env.name_of(payout.account),
                payout.amount.to_string(),
                format!("{:?}", payout.reason),
            ]);
        }
        println!("{}", payout_table);
    }

    Ok(())
}

pub async fn list_games(data_dir: &Path) -> Result<()> {
    let env = Env::open(data_dir).await?;
    let active = env.registry.list_active();

    if active.is_empty() {
        println!("No active games.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Type", "State", "Round", "Players", "Stake"]);

    for id in active {
        let view = SessionView::from(&env.registry.get_game(id).await?);
        let players = match view.player2 {
            Some(p2) => format!("{} vs {}", env.name_of(view.player1), env.name_of(p2)),
            None => format!("{} (waiting)", env.name_of(view.player1)),
        };
        table.add_row(vec![
            view.id.to_string(),
            view.game_type.to_string(),
            view.state.to_string(),
            view.round.to_string(),
            players,
            view.stake.to_string(),
        ]);
    }

    println!("Active Games:");
    println!("{}", table);
    Ok(())
}

pub async fn show_balances(data_dir: &Path) -> Result<()> {
    let env = Env::open(data_dir).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Player", "Balance"]);

    let mut names: Vec<&String> = env.ledger.accounts.keys().collect();
    names.sort();
    for name in names {
        let account = &env.ledger.accounts[name];
        let balance = env.bank.balance(account.id)?;
        table.add_row(vec![name.clone(), balance.to_string()]);
    }
    println!("{}", table);
    println!("Escrowed in active games: {}", env.bank.escrowed());
    Ok(())
}
