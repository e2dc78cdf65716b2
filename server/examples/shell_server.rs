//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Minimal Shell Bridge Server Example
//!
//! Runs the bridge on port 2333 with ten session workers, handing each
//! connection its own `/bin/bash` inside a pseudo-terminal.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example shell_server
//! ```
//!
//! Then connect with:
//! ```bash
//! telnet localhost 2333
//! ```

use shellbridge_server::{BridgeServer, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let config = ServerConfig::new("127.0.0.1:2333".parse()?)
        .with_worker_count(10)
        .with_shell("/bin/bash");

    let server = BridgeServer::new(config)?;
    let addr = server.start()?;

    println!("Shell bridge running on {addr}");
    println!("Press Ctrl+C to stop");

    // Park until interrupted; the OS reclaims everything on exit.
    loop {
        std::thread::park();
    }
}
