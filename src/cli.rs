use anyhow::{anyhow, bail, Context as _, Result};
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::appwrite::Appwrite;
use crate::args::{Args, Command};
use crate::cache::InMemoryViewCache;
use crate::config::{encode_key, Config, StoreKind};
use crate::db::{
    BankAccount, Cipher as _, DocumentStore, FileDocumentStore, NewUser, SharableId, User, UserId,
    XChaCha20Poly1305Cipher,
};
use crate::dwolla_api::Dwolla;
use crate::journal::{self, FileLinkJournal, RunIssue, UnreconciledRun};
use crate::link::{LinkWorkflow, LinkingProvider as _, PublicToken};
use crate::plaid_api::{self, Plaid};
use crate::server::{self, AppState};
use crate::sharable_id::SharableIdCodec;
use crate::summary::{self, format_amount, AccountsSummary};
use crate::terminal::{self, BulletPointPrinter, LineWriter};

pub async fn main(args: Args) -> Result<()> {
    let Args { config, command } = args;
    match command {
        Command::Init => main_init(&config).await,
        Command::GenerateKey => main_generate_key(),
        Command::Journal => main_journal(&config).await,
        Command::AddUser {
            name,
            email,
            dwolla_customer_url,
        } => {
            Cli::load(config)
                .await?
                .main_add_user(name, email, dwolla_customer_url)
                .await
        }
        Command::ListUsers => Cli::load(config).await?.main_list_users().await,
        Command::LinkAccount {
            user_id,
            public_token,
        } => {
            Cli::load(config)
                .await?
                .main_link_account(user_id, public_token)
                .await
        }
        Command::ListAccounts { user_id } => {
            Cli::load(config).await?.main_list_accounts(user_id).await
        }
        Command::Summary { user_id } => Cli::load(config).await?.main_summary(user_id).await,
        Command::Lookup { sharable_id } => {
            Cli::load(config).await?.main_lookup(sharable_id).await
        }
        Command::Serve { address, port } => Cli::load(config).await?.main_serve(address, port).await,
    }
}

async fn main_init(config: &Config) -> Result<()> {
    if config.store != StoreKind::Local {
        bail!("Only the local store needs to be initialized");
    }
    let cipher = XChaCha20Poly1305Cipher::with_key(&config.db_key()?);
    FileDocumentStore::create(&config.db_path, cipher)
        .await
        .context("Failed to create database")?;
    println!("Created database {}", config.db_path.display());

    // Test the API connection if credentials are configured
    if let Ok(plaid_config) = config.plaid() {
        plaid_api::test_connection(&Plaid::new(&plaid_config))
            .await
            .context("Plaid API connection failed")?;
        println!("Plaid API connection works");
    }
    Ok(())
}

fn main_generate_key() -> Result<()> {
    println!("{}", encode_key(&XChaCha20Poly1305Cipher::new_key()));
    Ok(())
}

async fn main_journal(config: &Config) -> Result<()> {
    let entries = FileLinkJournal::new(&config.journal_path)
        .read_all()
        .await
        .context("Failed to read link journal")?;
    println!("{}", style_header("Runs to reconcile with Dwolla:"));
    print_unreconciled(
        &BulletPointPrinter::new_stdout(),
        &journal::unreconciled(&entries),
    );
    Ok(())
}

pub struct Cli {
    config: Config,
    store: Arc<dyn DocumentStore>,
    cache: Arc<InMemoryViewCache>,
}

impl Cli {
    pub async fn load(config: Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store {
            StoreKind::Local => {
                let cipher = XChaCha20Poly1305Cipher::with_key(&config.db_key()?);
                Arc::new(
                    FileDocumentStore::open(&config.db_path, cipher)
                        .await
                        .context("Failed to load database")?,
                )
            }
            StoreKind::Appwrite => Arc::new(Appwrite::new(&config.appwrite()?)?),
        };
        Ok(Self {
            config,
            store,
            cache: Arc::new(InMemoryViewCache::new()),
        })
    }

    fn plaid(&self) -> Result<Arc<Plaid>> {
        Ok(Arc::new(Plaid::new(&self.config.plaid()?)))
    }

    fn codec(&self) -> Result<SharableIdCodec> {
        Ok(SharableIdCodec::with_key(&self.config.sharable_id_key()?))
    }

    fn workflow(&self, plaid: Arc<Plaid>) -> Result<LinkWorkflow> {
        Ok(LinkWorkflow::new(
            plaid,
            Arc::new(Dwolla::new(&self.config.dwolla()?)?),
            self.store.clone(),
            self.cache.clone(),
            Arc::new(FileLinkJournal::new(&self.config.journal_path)),
            self.codec()?,
        ))
    }

    async fn user(&self, user_id: String) -> Result<User> {
        let user_id = UserId(user_id);
        self.store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| anyhow!("User {user_id} not found"))
    }

    pub async fn main_add_user(
        &self,
        name: Option<String>,
        email: Option<String>,
        dwolla_customer_url: Option<String>,
    ) -> Result<()> {
        let name = name.map_or_else(|| terminal::prompt("Name"), Ok)?;
        let email = email.map_or_else(|| terminal::prompt("Email"), Ok)?;
        let dwolla_customer_url =
            dwolla_customer_url.map_or_else(|| terminal::prompt("Dwolla customer URL"), Ok)?;
        let user = NewUser::new(name, email, dwolla_customer_url)
            .ok_or_else(|| anyhow!("Dwolla customer URL doesn't end in a customer id"))?;

        let user = self.store.create_user(user).await?;
        println!();
        println!("{}", style_header("Added user:"));
        print_user(&BulletPointPrinter::new_stdout(), &user);
        Ok(())
    }

    pub async fn main_list_users(&self) -> Result<()> {
        println!("{}", style_header("Users:"));
        let users = self.store.list_users().await?;
        if users.is_empty() {
            println!("(none)");
        } else {
            let printer = BulletPointPrinter::new_stdout();
            for user in &users {
                print_user(&printer, user);
            }
        }
        Ok(())
    }

    pub async fn main_link_account(
        &self,
        user_id: String,
        public_token: Option<String>,
    ) -> Result<()> {
        let user = self.user(user_id).await?;
        let plaid = self.plaid()?;
        let workflow = self.workflow(plaid.clone())?;

        let public_token = match public_token {
            Some(public_token) => PublicToken(public_token),
            None => {
                let link_token = plaid.create_link_token(&user).await?;
                plaid_api::link_in_browser(link_token).await?
            }
        };

        let spinner = spinner("Linking bank account...");
        let result = workflow.exchange_public_token(&public_token, &user).await;
        spinner.finish_and_clear();
        let outcome = result?;

        println!("{}", style(&outcome).green().bold());
        println!();
        println!("{}", style_header("Linked bank account:"));
        print_bank_account(&BulletPointPrinter::new_stdout(), &outcome.bank_account);
        Ok(())
    }

    pub async fn main_list_accounts(&self, user_id: String) -> Result<()> {
        let user = self.user(user_id).await?;
        let accounts = self.store.list_bank_accounts(&user.id).await?;
        println!("{}", style_header("Bank accounts:"));
        let printer = BulletPointPrinter::new_stdout();
        print_user(&printer, &user);
        let printer = printer.indent();
        if accounts.is_empty() {
            printer.print_item(style("(none)").italic());
        }
        for account in &accounts {
            print_bank_account(&printer, account);
        }
        Ok(())
    }

    pub async fn main_summary(&self, user_id: String) -> Result<()> {
        let user = self.user(user_id).await?;
        let plaid = self.plaid()?;

        let spinner = spinner("Requesting balances...");
        let result = summary::summarize(plaid.as_ref(), self.store.as_ref(), &user.id).await;
        spinner.finish_and_clear();

        println!("{}", style_header("Balances:"));
        print_summary(&BulletPointPrinter::new_stdout(), &result?);
        Ok(())
    }

    pub async fn main_lookup(&self, sharable_id: String) -> Result<()> {
        let account_id = self.codec()?.decode(&SharableId(sharable_id))?;
        let account = self
            .store
            .find_bank_account_by_account_id(&account_id)
            .await?
            .ok_or_else(|| anyhow!("No bank account for this sharable id"))?;
        print_bank_account(&BulletPointPrinter::new_stdout(), &account);
        Ok(())
    }

    pub async fn main_serve(self, address: std::net::IpAddr, port: u16) -> Result<()> {
        let plaid = self.plaid()?;
        let state = AppState {
            workflow: self.workflow(plaid.clone())?,
            linking: plaid,
            store: self.store.clone(),
            cache: self.cache.clone(),
            codec: self.codec()?,
        };
        server::serve(state, address, port).await
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_user<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, user: &User) {
    printer.print_item(format!(
        "{} <{}> {}",
        style_user(&user.name),
        user.email,
        style_id(&user.id.0)
    ));
    if !user.has_customer_id() {
        printer
            .indent()
            .print_item(style("No Dwolla customer, can't link bank accounts").red());
    }
}

fn print_bank_account<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, account: &BankAccount) {
    printer.print_item(format!(
        "{} {}",
        style_account(&account.account_id.0),
        style_id(&account.id.0)
    ));
    let printer = printer.indent();
    printer.print_item(format!("Sharable id: {}", account.sharable_id));
    printer.print_item(format!("Funding source: {}", account.funding_source_url));
    printer.print_item(format!("Plaid item: {}", account.bank_id));
}

fn print_summary<W: LineWriter + Clone>(printer: &BulletPointPrinter<W>, summary: &AccountsSummary) {
    for account in &summary.accounts {
        let mask = account
            .mask
            .as_ref()
            .map(|mask| format!(" ****{mask}"))
            .unwrap_or_default();
        printer.print_item(format!(
            "{}{mask}: {}",
            style_account(&account.name),
            style_amount(account.current_balance)
        ));
    }
    printer.print_item(format!(
        "Total ({} bank accounts): {}",
        summary.total_banks,
        style_amount(summary.total_current_balance)
    ));
}

fn print_unreconciled<W: LineWriter + Clone>(
    printer: &BulletPointPrinter<W>,
    runs: &[UnreconciledRun],
) {
    if runs.is_empty() {
        printer.print_item(style("(none)").italic());
    }
    for run in runs {
        printer.print_item(format!(
            "{} {}",
            style(run.started_at.format("%Y-%m-%d %H:%M:%S")).bold(),
            style_id(&run.run_id.to_string())
        ));
        let printer = printer.indent();
        printer.print_item(format!("User: {}", run.user_id));
        match &run.issue {
            RunIssue::OrphanedFundingSource {
                account_id,
                funding_source_url,
            } => {
                printer.print_item(format!("Account: {account_id}"));
                printer.print_item(format!("Funding source: {funding_source_url}"));
            }
            RunIssue::Incomplete => {
                printer.print_item(style("Incomplete: no outcome recorded").yellow());
            }
            RunIssue::Ambiguous { step, message } => {
                printer.print_item(
                    style(format!("Ambiguous: {step} failed, check the payments provider"))
                        .yellow(),
                );
                printer.indent().print_item(message);
            }
        }
    }
}

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_user(name: &str) -> StyledObject<&str> {
    style(name).cyan().bold()
}

fn style_account(name: &str) -> StyledObject<&str> {
    style(name).magenta()
}

fn style_id(id: &str) -> StyledObject<String> {
    style(format!("[{id}]")).dim()
}

fn style_amount(amount: Decimal) -> StyledObject<String> {
    let result = style(format_amount(amount)).bold();
    if amount < Decimal::ZERO {
        result.red()
    } else {
        result.green()
    }
}
