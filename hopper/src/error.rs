// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use hopper_parser::{EncodeError, ParseError};
use std::{io, time::Duration};
use thiserror::Error;

/// Reasons why a single sub-query did not produce any answers.
///
/// None of them is fatal for the client query, the answers of the failed sub-query are
/// just left out of the response.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The upstream did not answer in time.
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    /// Could not send to or receive from the upstream.
    #[error("upstream transport error: {0}")]
    Transport(#[from] io::Error),
    /// The upstream answer could not be parsed.
    #[error("malformed upstream answer: {0}")]
    Malformed(#[from] ParseError),
    /// The upstream answered with a different transaction id.
    #[error("upstream answered with id {received} instead of {expected}")]
    IdMismatch {
        /// Id of the sub-query
        expected: u16,
        /// Id of the upstream answer
        received: u16,
    },
    /// The upstream sent something that is not a response.
    #[error("upstream packet is not a response")]
    NotAResponse,
    /// The upstream answer does not echo the question it was asked.
    #[error("upstream answered a different question")]
    QuestionMismatch,
    /// The sub-query could not be encoded.
    #[error("could not encode sub-query: {0}")]
    Encode(#[from] EncodeError),
}
