//! Standard security handlers for decryption.
//!
//! Key derivation, password validation, and per-object decryption for the
//! standard security handler family:
//!
//! - V1/V2 (R2, R3): RC4 with the MD5 key schedule
//! - V4 (R4): crypt filters selecting RC4 or AES-128
//! - V5 (R5, R6): AES-256 with SHA-2 based key unwrap
//!
//! The engine only decrypts; it never (re-)encrypts on write.

use crate::codec::aes::{aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
use crate::codec::arcfour::Arcfour;
use crate::error::{PdfError, Result};
use crate::model::objects::PdfDict;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Password padding constant from the PDF spec.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Trait for security handlers.
///
/// `attrs` carries the stream dictionary for stream decryption (V4+
/// handlers use it for the metadata exemption); strings pass `None`.
pub trait SecurityHandler {
    /// Decrypt bytes belonging to object (objid, genno).
    fn decrypt(&self, objid: u32, genno: u16, data: &[u8], attrs: Option<&PdfDict>) -> Vec<u8>;

    /// Decrypt a string value.
    fn decrypt_string(&self, objid: u32, genno: u16, data: &[u8]) -> Vec<u8> {
        self.decrypt(objid, genno, data, None)
    }

    /// Decrypt stream data with its attribute dictionary.
    fn decrypt_stream(&self, objid: u32, genno: u16, data: &[u8], attrs: &PdfDict) -> Vec<u8> {
        self.decrypt(objid, genno, data, Some(attrs))
    }
}

/// Pad or truncate a password to the fixed 32-byte block.
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    if len < 32 {
        padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    }
    padded
}

/// Standard security handler for R2 and R3 (RC4).
///
/// - V=1, R=2: 40-bit RC4
/// - V=2, R=3: variable-length RC4 (up to 128-bit)
pub struct StandardSecurityHandlerV2 {
    /// The computed file encryption key.
    key: Vec<u8>,
    /// Revision number (2 or 3).
    r: i64,
    /// Key length in bits.
    length: i64,
    /// Owner password hash (O value).
    o: Vec<u8>,
    /// User password hash (U value).
    u: Vec<u8>,
    /// Permission flags (P value).
    p: u32,
    /// Document ID (first element).
    docid: Vec<u8>,
}

impl StandardSecurityHandlerV2 {
    pub const SUPPORTED_REVISIONS: [i64; 2] = [2, 3];

    /// Build the handler and validate the supplied password (user first,
    /// then owner).
    pub fn new(encrypt: &PdfDict, doc_id: &[Vec<u8>], password: &str) -> Result<Self> {
        let r = get_int(encrypt, "R")?;
        let length = get_int_default(encrypt, "Length", 40).min(128);
        let o = get_bytes(encrypt, "O")?;
        let u = get_bytes(encrypt, "U")?;
        let p = get_uint32(encrypt, "P")?;

        if !Self::SUPPORTED_REVISIONS.contains(&r) {
            return Err(PdfError::EncryptionError(format!(
                "unsupported revision: R={}",
                r
            )));
        }

        let docid = doc_id.first().cloned().unwrap_or_default();

        let mut handler = Self {
            key: vec![],
            r,
            length,
            o,
            u,
            p,
            docid,
        };

        let password_bytes = password.as_bytes();
        if let Some(key) = handler.authenticate_user_password(password_bytes) {
            handler.key = key;
            Ok(handler)
        } else if let Some(key) = handler.authenticate_owner_password(password_bytes) {
            handler.key = key;
            Ok(handler)
        } else {
            Err(PdfError::EncryptionError("incorrect password".into()))
        }
    }

    /// Compute the file key from a password (Algorithm 3.2).
    fn compute_encryption_key(&self, password: &[u8]) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(pad_password(password));
        context.consume(&self.o);
        context.consume(self.p.to_le_bytes());
        context.consume(&self.docid);

        let mut result = context.finalize().0.to_vec();

        let n = if self.r >= 3 {
            (self.length / 8) as usize
        } else {
            5 // 40-bit for R2
        };

        // R3 and later iterate the hash 50 extra rounds
        if self.r >= 3 {
            for _ in 0..50 {
                let digest = md5::compute(&result[..n]);
                result = digest.0.to_vec();
            }
        }

        result[..n].to_vec()
    }

    /// Compute the expected U value from a key (Algorithm 3.4/3.5).
    fn compute_u_value(&self, key: &[u8]) -> Vec<u8> {
        if self.r == 2 {
            // Algorithm 3.4: direct RC4 of the fixed pad
            let mut cipher = Arcfour::new(key);
            cipher.process(&PASSWORD_PADDING)
        } else {
            // Algorithm 3.5: hash pad + docid, then a 20-round RC4 cascade
            let mut context = md5::Context::new();
            context.consume(PASSWORD_PADDING);
            context.consume(&self.docid);
            let hash = context.finalize();

            let mut result = Arcfour::new(key).process(&hash.0);

            for i in 1..20u8 {
                let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                result = Arcfour::new(&xor_key).process(&result);
            }

            // Padded to 32 bytes by repetition
            let mut padded = result.clone();
            padded.extend_from_slice(&result);
            padded.truncate(32);
            padded
        }
    }

    /// Verify a key against the stored U value (Algorithm 3.6).
    fn verify_encryption_key(&self, key: &[u8]) -> bool {
        let computed_u = self.compute_u_value(key);
        if self.r == 2 {
            computed_u == self.u
        } else {
            // R3 compares the first 16 bytes only
            computed_u.len() >= 16 && self.u.len() >= 16 && computed_u[..16] == self.u[..16]
        }
    }

    fn authenticate_user_password(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.compute_encryption_key(password);
        if self.verify_encryption_key(&key) {
            Some(key)
        } else {
            None
        }
    }

    /// Authenticate with the owner password (Algorithm 3.7): unwrap the
    /// user password from O, then authenticate with it.
    fn authenticate_owner_password(&self, password: &[u8]) -> Option<Vec<u8>> {
        let mut hash = md5::compute(pad_password(password)).0.to_vec();

        if self.r >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash).0.to_vec();
            }
        }

        let n = if self.r >= 3 {
            (self.length / 8) as usize
        } else {
            5
        };
        let key = &hash[..n];

        let user_password = if self.r == 2 {
            Arcfour::new(key).process(&self.o)
        } else {
            let mut result = self.o.clone();
            for i in (0..20u8).rev() {
                let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                result = Arcfour::new(&xor_key).process(&result);
            }
            result
        };

        self.authenticate_user_password(&user_password)
    }

    /// Per-object RC4: extend the file key with objid/genno bytes and hash.
    fn decrypt_rc4(&self, objid: u32, genno: u16, data: &[u8]) -> Vec<u8> {
        let mut key_data = self.key.clone();
        key_data.extend_from_slice(&objid.to_le_bytes()[..3]);
        key_data.extend_from_slice(&(genno as u32).to_le_bytes()[..2]);

        let hash = md5::compute(&key_data);
        let key_len = (self.key.len() + 5).min(16);
        let key = &hash.0[..key_len];

        Arcfour::new(key).process(data)
    }
}

impl SecurityHandler for StandardSecurityHandlerV2 {
    fn decrypt(&self, objid: u32, genno: u16, data: &[u8], _attrs: Option<&PdfDict>) -> Vec<u8> {
        self.decrypt_rc4(objid, genno, data)
    }
}

/// Crypt filter method.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CryptMethod {
    Identity,
    V2,    // RC4
    AESV2, // AES-128
    AESV3, // AES-256
}

fn resolve_crypt_method(cf: Option<&PdfDict>, name: &str) -> Result<CryptMethod> {
    if name == "Identity" {
        return Ok(CryptMethod::Identity);
    }

    let filter = cf.and_then(|cf| cf.get_dict(name)).ok_or_else(|| {
        PdfError::EncryptionError(format!("crypt filter '{}' not found in /CF", name))
    })?;

    match filter.get_name("CFM").unwrap_or("None") {
        "V2" => Ok(CryptMethod::V2),
        "AESV2" => Ok(CryptMethod::AESV2),
        "AESV3" => Ok(CryptMethod::AESV3),
        "None" => Ok(CryptMethod::Identity),
        other => Err(PdfError::EncryptionError(format!(
            "unknown crypt filter method: {}",
            other
        ))),
    }
}

fn is_metadata_stream(attrs: Option<&PdfDict>) -> bool {
    attrs.and_then(|a| a.get_name("Type")) == Some("Metadata")
}

/// Standard security handler for R4 (crypt filters, AES-128).
pub struct StandardSecurityHandlerV4 {
    /// The computed file encryption key (128-bit).
    key: Vec<u8>,
    /// Owner password hash (O value).
    o: Vec<u8>,
    /// User password hash (U value).
    u: Vec<u8>,
    /// Permission flags (P value).
    p: u32,
    /// Document ID (first element).
    docid: Vec<u8>,
    /// String encryption method.
    strf: CryptMethod,
    /// Stream encryption method.
    stmf: CryptMethod,
    /// Whether metadata streams are encrypted.
    encrypt_metadata: bool,
}

impl StandardSecurityHandlerV4 {
    pub fn new(encrypt: &PdfDict, doc_id: &[Vec<u8>], password: &str) -> Result<Self> {
        let r = get_int(encrypt, "R")?;
        if r != 4 {
            return Err(PdfError::EncryptionError(format!(
                "V4 handler requires R=4, got R={}",
                r
            )));
        }

        let o = get_bytes(encrypt, "O")?;
        let u = get_bytes(encrypt, "U")?;
        let p = get_uint32(encrypt, "P")?;

        let strf_name = encrypt.get_name("StrF").unwrap_or("Identity");
        let stmf_name = encrypt.get_name("StmF").unwrap_or("Identity");
        let cf = encrypt.get_dict("CF");
        let strf = resolve_crypt_method(cf, strf_name)?;
        let stmf = resolve_crypt_method(cf, stmf_name)?;

        let encrypt_metadata = encrypt.get_bool("EncryptMetadata").unwrap_or(true);
        let docid = doc_id.first().cloned().unwrap_or_default();

        let mut handler = Self {
            key: vec![],
            o,
            u,
            p,
            docid,
            strf,
            stmf,
            encrypt_metadata,
        };

        let password_bytes = password.as_bytes();
        if let Some(key) = handler.authenticate_user_password(password_bytes) {
            handler.key = key;
            Ok(handler)
        } else if let Some(key) = handler.authenticate_owner_password(password_bytes) {
            handler.key = key;
            Ok(handler)
        } else {
            Err(PdfError::EncryptionError("incorrect password".into()))
        }
    }

    /// Algorithm 3.2 with the 128-bit key and EncryptMetadata extension.
    fn compute_encryption_key(&self, password: &[u8]) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(pad_password(password));
        context.consume(&self.o);
        context.consume(self.p.to_le_bytes());
        context.consume(&self.docid);

        if !self.encrypt_metadata {
            context.consume([0xFF, 0xFF, 0xFF, 0xFF]);
        }

        let mut result = context.finalize().0.to_vec();

        for _ in 0..50 {
            let digest = md5::compute(&result[..16]);
            result = digest.0.to_vec();
        }

        result[..16].to_vec()
    }

    fn compute_u_value(&self, key: &[u8]) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(PASSWORD_PADDING);
        context.consume(&self.docid);
        let hash = context.finalize();

        let mut result = Arcfour::new(key).process(&hash.0);

        for i in 1..20u8 {
            let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = Arcfour::new(&xor_key).process(&result);
        }

        let mut padded = result.clone();
        padded.extend_from_slice(&result);
        padded.truncate(32);
        padded
    }

    fn authenticate_user_password(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.compute_encryption_key(password);
        let computed_u = self.compute_u_value(&key);
        let ok = computed_u.len() >= 16 && self.u.len() >= 16 && computed_u[..16] == self.u[..16];
        if ok { Some(key) } else { None }
    }

    fn authenticate_owner_password(&self, password: &[u8]) -> Option<Vec<u8>> {
        let mut hash = md5::compute(pad_password(password)).0.to_vec();
        for _ in 0..50 {
            hash = md5::compute(&hash).0.to_vec();
        }

        let key = &hash[..16];
        let mut result = self.o.clone();
        for i in (0..20u8).rev() {
            let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = Arcfour::new(&xor_key).process(&result);
        }

        self.authenticate_user_password(&result)
    }

    fn decrypt_with_method(
        &self,
        method: CryptMethod,
        objid: u32,
        genno: u16,
        data: &[u8],
    ) -> Vec<u8> {
        match method {
            CryptMethod::Identity => data.to_vec(),
            CryptMethod::V2 => self.decrypt_rc4(objid, genno, data),
            CryptMethod::AESV2 => self.decrypt_aes128(objid, genno, data),
            // AESV3 does not belong to a V4 handler; leave the data alone
            CryptMethod::AESV3 => data.to_vec(),
        }
    }

    fn decrypt_rc4(&self, objid: u32, genno: u16, data: &[u8]) -> Vec<u8> {
        let mut key_data = self.key.clone();
        key_data.extend_from_slice(&objid.to_le_bytes()[..3]);
        key_data.extend_from_slice(&(genno as u32).to_le_bytes()[..2]);

        let hash = md5::compute(&key_data);
        let key_len = (self.key.len() + 5).min(16);
        let key = &hash.0[..key_len];

        Arcfour::new(key).process(data)
    }

    /// Per-object AES-128: the object key gets the fixed `sAlT` suffix,
    /// the first 16 data bytes are the IV, padding is PKCS#7.
    fn decrypt_aes128(&self, objid: u32, genno: u16, data: &[u8]) -> Vec<u8> {
        if data.len() < 16 {
            return data.to_vec(); // not enough data for an IV
        }

        let mut key_data = self.key.clone();
        key_data.extend_from_slice(&objid.to_le_bytes()[..3]);
        key_data.extend_from_slice(&(genno as u32).to_le_bytes()[..2]);
        key_data.extend_from_slice(b"sAlT");

        let hash = md5::compute(&key_data);
        let key = &hash.0[..16];

        let iv = &data[..16];
        let ciphertext = &data[16..];

        if ciphertext.is_empty() {
            return vec![];
        }

        let plaintext = aes_cbc_decrypt(key, iv, ciphertext);
        unpad_aes(&plaintext).to_vec()
    }
}

impl SecurityHandler for StandardSecurityHandlerV4 {
    fn decrypt(&self, objid: u32, genno: u16, data: &[u8], attrs: Option<&PdfDict>) -> Vec<u8> {
        if !self.encrypt_metadata && is_metadata_stream(attrs) {
            return data.to_vec();
        }

        // strf for strings (attrs=None), stmf for streams (attrs=Some)
        let method = if attrs.is_some() { self.stmf } else { self.strf };
        self.decrypt_with_method(method, objid, genno, data)
    }
}

/// Standard security handler for R5/R6 (AES-256).
pub struct StandardSecurityHandlerV5 {
    /// The 256-bit file encryption key.
    key: Vec<u8>,
    /// Revision number (5 or 6).
    r: i64,
    /// Encrypted owner key (OE).
    oe: Vec<u8>,
    /// Encrypted user key (UE).
    ue: Vec<u8>,
    /// Owner hash (first 32 bytes of O).
    o_hash: Vec<u8>,
    /// Owner validation salt (bytes 32-40 of O).
    o_validation_salt: Vec<u8>,
    /// Owner key salt (bytes 40-48 of O).
    o_key_salt: Vec<u8>,
    /// User hash (first 32 bytes of U).
    u_hash: Vec<u8>,
    /// User validation salt (bytes 32-40 of U).
    u_validation_salt: Vec<u8>,
    /// User key salt (bytes 40-48 of U).
    u_key_salt: Vec<u8>,
    /// Full U value (owner password verification hashes over it).
    u: Vec<u8>,
    /// String encryption method.
    strf: CryptMethod,
    /// Stream encryption method.
    stmf: CryptMethod,
    /// Whether metadata streams are encrypted.
    encrypt_metadata: bool,
}

impl StandardSecurityHandlerV5 {
    pub const SUPPORTED_REVISIONS: [i64; 2] = [5, 6];

    pub fn new(encrypt: &PdfDict, password: &str) -> Result<Self> {
        let r = get_int(encrypt, "R")?;
        if !Self::SUPPORTED_REVISIONS.contains(&r) {
            return Err(PdfError::EncryptionError(format!(
                "V5 handler requires R=5 or R=6, got R={}",
                r
            )));
        }

        let o = get_bytes(encrypt, "O")?;
        let u = get_bytes(encrypt, "U")?;
        let oe = get_bytes(encrypt, "OE")?;
        let ue = get_bytes(encrypt, "UE")?;

        for (name, value, want) in [("O", &o, 48), ("U", &u, 48), ("OE", &oe, 32), ("UE", &ue, 32)]
        {
            if value.len() < want {
                return Err(PdfError::EncryptionError(format!(
                    "{} value too short: {} bytes, expected {}",
                    name,
                    value.len(),
                    want
                )));
            }
        }

        let o_hash = o[..32].to_vec();
        let o_validation_salt = o[32..40].to_vec();
        let o_key_salt = o[40..48].to_vec();
        let u_hash = u[..32].to_vec();
        let u_validation_salt = u[32..40].to_vec();
        let u_key_salt = u[40..48].to_vec();

        let strf_name = encrypt.get_name("StrF").unwrap_or("Identity");
        let stmf_name = encrypt.get_name("StmF").unwrap_or("Identity");
        let cf = encrypt.get_dict("CF");
        let strf = resolve_crypt_method(cf, strf_name)?;
        let stmf = resolve_crypt_method(cf, stmf_name)?;

        let encrypt_metadata = encrypt.get_bool("EncryptMetadata").unwrap_or(true);

        let mut handler = Self {
            key: vec![],
            r,
            oe,
            ue,
            o_hash,
            o_validation_salt,
            o_key_salt,
            u_hash,
            u_validation_salt,
            u_key_salt,
            u,
            strf,
            stmf,
            encrypt_metadata,
        };

        if let Some(key) = handler.authenticate(password) {
            handler.key = key;
            Ok(handler)
        } else {
            Err(PdfError::EncryptionError("incorrect password".into()))
        }
    }

    /// Try the owner password first, then the user password.
    fn authenticate(&self, password: &str) -> Option<Vec<u8>> {
        let password_bytes = normalize_password(password);

        let hash = self.password_hash(&password_bytes, &self.o_validation_salt, Some(&self.u));
        if hash == self.o_hash {
            let key_hash = self.password_hash(&password_bytes, &self.o_key_salt, Some(&self.u));
            let key = aes_cbc_decrypt(&key_hash, &[0u8; 16], &self.oe);
            return Some(key);
        }

        let hash = self.password_hash(&password_bytes, &self.u_validation_salt, None);
        if hash == self.u_hash {
            let key_hash = self.password_hash(&password_bytes, &self.u_key_salt, None);
            let key = aes_cbc_decrypt(&key_hash, &[0u8; 16], &self.ue);
            return Some(key);
        }

        None
    }

    fn password_hash(&self, password: &[u8], salt: &[u8], vector: Option<&[u8]>) -> Vec<u8> {
        if self.r == 5 {
            self.r5_password(password, salt, vector)
        } else {
            self.r6_password(password, &salt[..8], vector)
        }
    }

    /// Revision-5 hash: one round of SHA-256.
    fn r5_password(&self, password: &[u8], salt: &[u8], vector: Option<&[u8]>) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        if let Some(v) = vector {
            hasher.update(v);
        }
        hasher.finalize().to_vec()
    }

    /// Revision-6 hash: the iterated SHA-256/384/512 + AES construction.
    fn r6_password(&self, password: &[u8], salt: &[u8], vector: Option<&[u8]>) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        if let Some(v) = vector {
            hasher.update(v);
        }
        let mut k = hasher.finalize().to_vec();

        let mut round_no = 0u32;
        let mut last_byte_val = 0u8;

        while round_no < 64 || last_byte_val > (round_no as u8).wrapping_sub(32) {
            // k1 = (password + k + vector) repeated 64 times
            let vector_bytes = vector.unwrap_or(&[]);
            let base: Vec<u8> = password
                .iter()
                .chain(k.iter())
                .chain(vector_bytes.iter())
                .copied()
                .collect();
            let mut k1 = Vec::with_capacity(base.len() * 64);
            for _ in 0..64 {
                k1.extend_from_slice(&base);
            }

            let e = aes_cbc_encrypt(&k[..16], &k[16..32], &k1);

            // Next hash picked by the first 16 bytes of e mod 3
            k = match bytes_mod_3(&e[..16]) {
                0 => Sha256::digest(&e).to_vec(),
                1 => Sha384::digest(&e).to_vec(),
                _ => Sha512::digest(&e).to_vec(),
            };

            last_byte_val = e[e.len() - 1];
            round_no += 1;
        }

        k[..32].to_vec()
    }

    /// AES-256-CBC with the base key; R5/R6 use no per-object derivation.
    fn decrypt_aes256(&self, data: &[u8]) -> Vec<u8> {
        if data.len() < 16 {
            return data.to_vec();
        }

        let iv = &data[..16];
        let ciphertext = &data[16..];

        if ciphertext.is_empty() {
            return vec![];
        }

        let plaintext = aes_cbc_decrypt(&self.key, iv, ciphertext);
        unpad_aes(&plaintext).to_vec()
    }

    fn decrypt_with_method(&self, method: CryptMethod, data: &[u8]) -> Vec<u8> {
        match method {
            CryptMethod::Identity => data.to_vec(),
            CryptMethod::AESV3 => self.decrypt_aes256(data),
            // RC4/AES-128 do not belong to a V5 handler; leave the data
            CryptMethod::AESV2 | CryptMethod::V2 => data.to_vec(),
        }
    }
}

impl SecurityHandler for StandardSecurityHandlerV5 {
    fn decrypt(&self, _objid: u32, _genno: u16, data: &[u8], attrs: Option<&PdfDict>) -> Vec<u8> {
        if !self.encrypt_metadata && is_metadata_stream(attrs) {
            return data.to_vec();
        }

        let method = if attrs.is_some() { self.stmf } else { self.strf };
        self.decrypt_with_method(method, data)
    }
}

/// UTF-8 encode and truncate to 127 bytes.
///
/// SASLprep normalization for R6 is not applied; for ASCII passwords the
/// result is identical.
fn normalize_password(password: &str) -> Vec<u8> {
    let bytes = password.as_bytes();
    bytes[..bytes.len().min(127)].to_vec()
}

/// Sum of bytes mod 3 (256 is 1 mod 3, so byte remainders suffice).
fn bytes_mod_3(input: &[u8]) -> usize {
    input.iter().map(|&b| (b % 3) as usize).sum::<usize>() % 3
}

fn get_int(encrypt: &PdfDict, key: &str) -> Result<i64> {
    encrypt
        .get(key)
        .ok_or_else(|| PdfError::EncryptionError(format!("missing {} in /Encrypt", key)))?
        .as_int()
}

fn get_int_default(encrypt: &PdfDict, key: &str, default: i64) -> i64 {
    encrypt.get_int(key).unwrap_or(default)
}

fn get_bytes(encrypt: &PdfDict, key: &str) -> Result<Vec<u8>> {
    encrypt
        .get(key)
        .ok_or_else(|| PdfError::EncryptionError(format!("missing {} in /Encrypt", key)))?
        .as_string()
        .map(|s| s.to_vec())
}

/// The P value is stored signed but used as a bit field.
fn get_uint32(encrypt: &PdfDict, key: &str) -> Result<u32> {
    Ok(get_int(encrypt, key)? as u32)
}

/// Create the security handler matching an /Encrypt dictionary.
///
/// Returns `Ok(None)` for an empty dictionary (no encryption). Password
/// validation failures and unsupported V/R combinations are errors.
pub fn create_security_handler(
    encrypt: &PdfDict,
    doc_id: &[Vec<u8>],
    password: &str,
) -> Result<Option<Box<dyn SecurityHandler>>> {
    if encrypt.is_empty() {
        return Ok(None);
    }

    let v = get_int_default(encrypt, "V", 0);
    let r = get_int(encrypt, "R")?;

    match (v, r) {
        // 40-bit and variable-length RC4
        (1, 2) | (2, 3) => {
            let handler = StandardSecurityHandlerV2::new(encrypt, doc_id, password)?;
            Ok(Some(Box::new(handler)))
        }
        // Crypt filters, AES-128
        (4, 4) => {
            let handler = StandardSecurityHandlerV4::new(encrypt, doc_id, password)?;
            Ok(Some(Box::new(handler)))
        }
        // AES-256
        (5, 5) | (5, 6) => {
            let handler = StandardSecurityHandlerV5::new(encrypt, password)?;
            Ok(Some(Box::new(handler)))
        }
        _ => Err(PdfError::EncryptionError(format!(
            "unsupported encryption: V={}, R={}",
            v, r
        ))),
    }
}
