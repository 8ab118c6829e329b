//! PDF object parser - builds typed objects from the token stream.
//!
//! Indirect references (`num num R`) become [`PDFObjRef`] placeholders;
//! nothing is resolved eagerly. Arrays and dictionaries are assembled by
//! recursive-descent helpers over the flat token stream.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject, PdfDict};
use crate::parser::lexer::{Lexer, Token};

/// Parses PDF object syntax on top of [`Lexer`].
pub struct PDFParser<'a> {
    lexer: Lexer<'a>,
    /// Pushback buffer for reference lookahead
    lookahead: Vec<Token>,
    warnings: Vec<String>,
}

impl<'a> PDFParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a parser positioned at an arbitrary offset.
    pub fn new_at(data: &'a [u8], pos: usize) -> Self {
        let mut parser = Self::new(data);
        parser.seek(pos);
        parser
    }

    /// Current position in the buffer.
    pub fn tell(&self) -> usize {
        self.lexer.tell()
    }

    /// Re-seek; any pushed-back tokens are discarded.
    pub fn seek(&mut self, pos: usize) {
        self.lookahead.clear();
        self.lexer.seek(pos);
    }

    /// Unconsumed bytes from the current position.
    pub fn remaining(&self) -> &'a [u8] {
        self.lexer.remaining()
    }

    /// Drain warnings collected by the parser and its lexer.
    pub fn take_warnings(&mut self) -> Vec<String> {
        let mut warnings = std::mem::take(&mut self.warnings);
        warnings.extend(self.lexer.take_warnings());
        warnings
    }

    /// Get next token (from lookahead or the lexer).
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        match self.lexer.next_token() {
            Some(Ok((_, tok))) => Ok(Some(tok)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn push_back(&mut self, tok: Token) {
        self.lookahead.push(tok);
    }

    /// Parse the next PDF object.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
        self.token_to_object(token)
    }

    /// Convert a token to a PDF object, with reference lookahead.
    fn token_to_object(&mut self, token: Token) -> Result<PDFObject> {
        match token {
            Token::Int(n) => {
                // Could be the start of an indirect reference: objid genno R
                if let Ok(Some(tok2)) = self.next_token() {
                    if let Token::Int(m) = tok2 {
                        if let Ok(Some(tok3)) = self.next_token() {
                            if matches!(&tok3, Token::Keyword(kw) if kw == b"R")
                                && n >= 0
                                && m >= 0
                            {
                                return Ok(PDFObject::Ref(PDFObjRef::new(n as u32, m as u16)));
                            }
                            self.push_back(tok3);
                        }
                        self.push_back(Token::Int(m));
                    } else {
                        self.push_back(tok2);
                    }
                }
                Ok(PDFObject::Int(n))
            }
            Token::Real(n) => Ok(PDFObject::Real(n)),
            Token::Bool(b) => Ok(PDFObject::Bool(b)),
            Token::Literal(s) => Ok(PDFObject::Name(s)),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::Comment(_) => {
                // Comments are not objects; take the next one
                self.parse_object()
            }
            Token::Keyword(kw) => {
                if kw == b"null" {
                    return Ok(PDFObject::Null);
                }
                if kw == b"[" {
                    return self.parse_array();
                }
                if kw == b"<<" {
                    return self.parse_dict();
                }
                // Any other keyword is an error in object context
                Err(PdfError::TokenError {
                    pos: self.lexer.tell(),
                    msg: format!("unexpected keyword: {}", String::from_utf8_lossy(&kw)),
                })
            }
        }
    }

    /// Parse array contents until `]`.
    fn parse_array(&mut self) -> Result<PDFObject> {
        let mut arr = Vec::new();

        loop {
            let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;

            if matches!(&token, Token::Keyword(kw) if kw == b"]") {
                break;
            }

            arr.push(self.token_to_object(token)?);
        }

        Ok(PDFObject::Array(arr))
    }

    /// Parse dict contents until `>>`.
    fn parse_dict(&mut self) -> Result<PDFObject> {
        let mut dict = PdfDict::new();

        loop {
            let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;

            if matches!(&token, Token::Keyword(kw) if kw == b">>") {
                break;
            }

            // Keys must be names; a stray non-name key is skipped with its
            // value so the rest of the dictionary survives.
            let key = match token {
                Token::Literal(name) => name,
                other => {
                    self.warnings.push(format!(
                        "non-name dictionary key {:?} at offset {}",
                        other,
                        self.lexer.tell()
                    ));
                    let _ = self.parse_object();
                    continue;
                }
            };

            let value = self.parse_object()?;
            dict.set(key, value);
        }

        Ok(PDFObject::Dict(dict))
    }
}
