use clap::{Parser, Subcommand};

/// Greenlight — approval lifecycle backend for human-gated automations
#[derive(Parser)]
#[command(name = "greenlight", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8088")]
        port: u16,
    },

    /// Run pending database migrations and exit
    Migrate,

    /// Operate on approvals directly (recovery / review from the terminal)
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List pending approvals for an organization
    List {
        #[arg(long)]
        org_id: String,
    },
    /// Approve a pending approval (dispatches its execution endpoint)
    Approve {
        approval_id: String,
        #[arg(long)]
        org_id: String,
        /// User to attribute the decision to
        #[arg(long)]
        user_id: String,
    },
    /// Reject a pending approval
    Reject {
        approval_id: String,
        #[arg(long)]
        org_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}
