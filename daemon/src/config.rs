// Copyright (c) 2023 Yan Ka, Chiu.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions, and the following disclaimer,
//    without modification, immediately at the beginning of the file.
// 2. The name of the author may not be used to endorse or promote products
//    derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE AUTHOR AND CONTRIBUTORS ``AS IS'' AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
// ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
// OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
// HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
// OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF
// SUCH DAMAGE.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "local cluster observability and operations daemon")]
pub struct Args {
    /// Path to a kubeconfig file. Falls through to the in-cluster token,
    /// then the default kubeconfig location, when unset.
    #[arg(long)]
    pub credential_path: Option<PathBuf>,

    /// Namespace the UI opens into. Unset means "all namespaces".
    #[arg(long)]
    pub initial_namespace: Option<String>,

    #[arg(long, default_value_t = 7417)]
    pub port: u16,

    #[arg(long, default_value_t = false)]
    pub open_browser: bool,

    #[arg(long, default_value_t = false)]
    pub development_mode: bool,

    /// Append change records to a JSON-delimited log under the home
    /// directory instead of only keeping the in-memory ring buffer.
    #[arg(long, default_value_t = false)]
    pub persist_history: bool,

    #[arg(long, default_value_t = kview_core::history::DEFAULT_CAPACITY)]
    pub history_limit: usize,

    /// Curated custom-resource kinds the dynamic cache watches eagerly
    /// instead of serving on demand, e.g. `HelmRelease`.
    #[arg(long, value_delimiter = ',')]
    pub curated_kinds: Vec<String>,

    /// Refuses every write, delete, and session-opening endpoint with 405.
    #[arg(long, default_value_t = false)]
    pub read_only: bool,
}

impl Args {
    pub fn persist_path(&self) -> Option<PathBuf> {
        if !self.persist_history {
            return None;
        }
        dirs_home().map(|home| home.join(".kview").join("history.jsonl"))
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
