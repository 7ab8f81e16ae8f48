// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell completion generation for the turnstile CLI.
//!
//! ```bash
//! # Bash
//! turnstile completions bash > ~/.local/share/bash-completion/completions/turnstile
//!
//! # Zsh
//! turnstile completions zsh > ~/.zfunc/_turnstile
//!
//! # Fish
//! turnstile completions fish > ~/.config/fish/completions/turnstile.fish
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub const BIN_NAME: &str = "turnstile";

/// Generate shell completions and write to stdout.
pub fn generate_completions<C: CommandFactory>(shell: Shell) {
    let mut cmd = C::command();
    generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
}

/// Arguments for the completions command.
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
