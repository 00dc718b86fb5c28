use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use backplane_core::VERSION;

/// Backplane - pluggable storage, queue and auth backends behind one CLI
#[derive(Parser)]
#[command(name = "backplane")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "BACKPLANE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter config file
    Init(InitArgs),

    /// Show the effective configuration (secrets redacted)
    Config,

    /// Read and write records in the configured storage backend
    #[command(subcommand)]
    Records(RecordsCommand),

    /// Send and receive messages on a named queue
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Register users and manage sessions
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Call a registered service function
    Invoke(InvokeArgs),

    /// List registered service functions
    Services,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Storage backend (tinydb, filesystem, s3, dynamodb, none)
    #[arg(long, default_value = "tinydb")]
    pub database_type: String,

    /// Directory for the local storage backends
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum RecordsCommand {
    /// Insert (or overwrite) a record
    Put(PutArgs),
    /// Show one record
    Get(GetArgs),
    /// List the records in a table
    List(ListArgs),
    /// Merge fields into an existing record
    Update(UpdateArgs),
    /// Delete a record (no error if missing)
    Delete(RecordKeyArgs),
}

/// Arguments for `records put`
#[derive(Args)]
pub struct PutArgs {
    /// Table name
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// JSON object to store
    #[arg(value_name = "JSON")]
    pub data: String,

    /// Record id (defaults to the object's `id`, else a new UUID)
    #[arg(long)]
    pub id: Option<String>,
}

/// Table plus record id
#[derive(Args)]
pub struct RecordKeyArgs {
    /// Table name
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Record id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for `records get`
#[derive(Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub key: RecordKeyArgs,

    /// Write the raw stored bytes instead of the record
    #[arg(long)]
    pub binary: bool,
}

/// Arguments for `records list`
#[derive(Args)]
pub struct ListArgs {
    /// Table name
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Only ids starting with this prefix
    #[arg(long, value_name = "PREFIX", conflicts_with = "pattern")]
    pub prefix: Option<String>,

    /// Only ids matching this regular expression
    #[arg(long, value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `records update`
#[derive(Args)]
pub struct UpdateArgs {
    /// Table name
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Record id
    #[arg(value_name = "ID")]
    pub id: String,

    /// JSON object with the fields to change
    #[arg(value_name = "JSON")]
    pub data: String,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Send one message
    Send(SendArgs),
    /// Receive (and acknowledge) one message
    Receive(ReceiveArgs),
    /// Show the approximate number of waiting messages
    Count(QueueNameArgs),
    /// Poll the queue and print each message as a JSON line
    Listen(ListenArgs),
}

/// Logical queue name
#[derive(Args)]
pub struct QueueNameArgs {
    /// Queue name (defaults to `queue_name` from the config)
    #[arg(long)]
    pub name: Option<String>,
}

/// Arguments for `queue send`
#[derive(Args)]
pub struct SendArgs {
    #[command(flatten)]
    pub queue: QueueNameArgs,

    /// Message body (JSON, or plain text)
    #[arg(value_name = "BODY")]
    pub body: String,
}

/// Arguments for `queue receive`
#[derive(Args)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub queue: QueueNameArgs,

    /// Leave the message on the queue for redelivery
    #[arg(long)]
    pub keep: bool,
}

/// Arguments for `queue listen`
#[derive(Args)]
pub struct ListenArgs {
    #[command(flatten)]
    pub queue: QueueNameArgs,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many polls
    #[arg(long)]
    pub max_polls: Option<u64>,
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Create a user
    Register(CredentialsArgs),
    /// Authenticate and print a session token
    Login(CredentialsArgs),
    /// Show the identity behind a token
    Whoami(TokenArgs),
    /// Exchange a token for a fresh one
    Refresh(TokenArgs),
    /// Revoke a token
    Logout(TokenArgs),
}

/// Username plus password source
#[derive(Args)]
pub struct CredentialsArgs {
    /// Username (email)
    #[arg(value_name = "USERNAME")]
    pub username: String,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

/// Session token
#[derive(Args)]
pub struct TokenArgs {
    /// Session token
    #[arg(long, env = "BACKPLANE_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// Arguments for the `invoke` command
#[derive(Args)]
pub struct InvokeArgs {
    /// Service module (e.g. config_service)
    #[arg(value_name = "MODULE")]
    pub module: String,

    /// Function name (e.g. get_all_config)
    #[arg(value_name = "FUNCTION")]
    pub function: String,

    /// Positional arguments; each is parsed as JSON, else passed as a string
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Session token identifying the caller
    #[arg(long, env = "BACKPLANE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}
