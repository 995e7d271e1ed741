// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use pretty_hex::pretty_hex;

use hopper_parser::body::ResourceRecord;
use hopper_parser::header::{QueryResponse, RecursionAvailable};
use hopper_parser::DnsPacket;

const REQ: &[u8; 33] = include_bytes!("../assets/dns_request.bin");
const RES: &[u8; 49] = include_bytes!("../assets/dns_response.bin");

fn main() {
    let mut res = DnsPacket::try_from(&REQ[..]).unwrap();

    // Change some flags
    res.header.flags.qr = QueryResponse::Response;
    res.header.flags.ra = RecursionAvailable::Available;

    // Add answer
    let answer = ResourceRecord::synthesize_a(&res.questions[0], "204.74.99.100".parse().unwrap());
    res.header.answers = 1;
    res.answers.push(answer);

    let res = Vec::<u8>::try_from(&res).unwrap();

    println!("=================== Uncompressed Response ===================");
    println!("{}\n", pretty_hex(&res));

    println!("=================== Compressed Response ===================");
    println!("{}\n", pretty_hex(RES));
}
