// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::Ipv4Addr;

use hopper::{Server, Synthesizer};

// Answers every A question with 127.0.0.1, try it with:
//   dig @127.0.0.1 -p 5353 example.com
#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    Server::default()
        .bind("127.0.0.1:5353".parse().unwrap())
        .await?
        .serve(Synthesizer::new(Ipv4Addr::LOCALHOST))
        .await;
    Ok(())
}
