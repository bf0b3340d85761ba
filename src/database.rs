use crate::model::*;
use chrono::NaiveDate;
use sled::transaction::{abort, TransactionError, Transactional};
use thiserror::Error;

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> u64 {
    use std::convert::TryInto;
    u64::from_le_bytes(id.as_ref().try_into().unwrap())
}

/// Ledger keys are the owning user's id followed by the imdb id, so the pair
/// is unique by construction and one user's entries form a contiguous key
/// range reachable with a prefix scan.
fn entry_key(user_id: u64, imdb_id: &str) -> Vec<u8> {
    let mut key = serialize_id(user_id).to_vec();
    key.extend_from_slice(imdb_id.as_bytes());
    key
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"users_username";
const LEDGER: &[u8] = b"ledger";

/// Failures surfaced by the stores. Duplicates and missing records carry a
/// distinct kind so callers can re-prompt instead of showing a generic
/// error; storage and hashing failures pass through untranslated.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("movie is already in the ledger")]
    DuplicateEntry,
    #[error("no such record")]
    NotFound,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Db(#[from] sled::Error),
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(err: TransactionError<StoreError>) -> StoreError {
        match err {
            TransactionError::Storage(err) => StoreError::Db(err),
            TransactionError::Abort(err) => err,
        }
    }
}

/// Derives a storable secret from a plaintext password. Registration uses
/// this internally; the profile-edit flow calls it directly and persists the
/// result through `update_profile`.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub trait UserStore {
    fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        img_url: Option<String>,
    ) -> Result<(u64, User), StoreError>;
    fn authenticate(&self, username: &str, password: &str)
        -> Result<Option<(u64, User)>, StoreError>;
    fn get_user(&self, id: u64) -> Result<Option<User>, StoreError>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, StoreError>;
    fn update_profile(
        &self,
        id: u64,
        username: &str,
        email: &str,
        img_url: Option<String>,
        password_hash: Option<String>,
    ) -> Result<(), StoreError>;
    fn delete_user(&self, id: u64) -> Result<(), StoreError>;
}

impl UserStore for sled::Db {
    fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        img_url: Option<String>,
    ) -> Result<(u64, User), StoreError> {
        if username.is_empty() {
            return Err(StoreError::Validation("username is required"));
        }
        if password.is_empty() {
            return Err(StoreError::Validation("password is required"));
        }
        if email.is_empty() {
            return Err(StoreError::Validation("e-mail is required"));
        }
        let user = User {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: hash_password(password)?,
            img_url,
        };
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        (&users, &users_username)
            .transaction(|(users, users_username)| {
                if users_username
                    .insert(user.username.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    return abort(StoreError::DuplicateUsername);
                }
                users.insert(&serialize_id(id), bincode::serialize(&user).unwrap())?;
                Ok(())
            })
            .map_err(StoreError::from)?;
        Ok((id, user))
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<(u64, User)>, StoreError> {
        // An unknown username and a wrong password both come back as None so
        // callers cannot tell them apart.
        if let Some((id, user)) = self.get_user_by_username(username)? {
            if bcrypt::verify(password, &user.password_hash)? {
                return Ok(Some((id, user)));
            }
        }
        Ok(None)
    }

    fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        let users = self.open_tree(USERS)?;
        Ok(users
            .get(serialize_id(id))?
            .map(|d| bincode::deserialize(&d).unwrap()))
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, StoreError> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_username.get(username)? {
            let user =
                bincode::deserialize(&users.get(&id)?.expect("Bad index users_username")).unwrap();
            Ok(Some((deserialize_id(id), user)))
        } else {
            Ok(None)
        }
    }

    fn update_profile(
        &self,
        id: u64,
        username: &str,
        email: &str,
        img_url: Option<String>,
        password_hash: Option<String>,
    ) -> Result<(), StoreError> {
        if username.is_empty() {
            return Err(StoreError::Validation("username is required"));
        }
        if email.is_empty() {
            return Err(StoreError::Validation("e-mail is required"));
        }
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        (&users, &users_username)
            .transaction(|(users, users_username)| {
                let raw = match users.get(&serialize_id(id))? {
                    Some(raw) => raw,
                    None => return abort(StoreError::NotFound),
                };
                let mut user: User = bincode::deserialize(&raw).unwrap();
                if user.username != username {
                    if let Some(existing) = users_username.get(username)? {
                        if deserialize_id(existing) != id {
                            return abort(StoreError::DuplicateUsername);
                        }
                    }
                    users_username.remove(user.username.as_bytes())?;
                    users_username.insert(username.as_bytes(), &serialize_id(id))?;
                }
                user.username = username.to_owned();
                user.email = email.to_owned();
                user.img_url = img_url.clone();
                if let Some(hash) = &password_hash {
                    user.password_hash = hash.clone();
                }
                users.insert(&serialize_id(id), bincode::serialize(&user).unwrap())?;
                Ok(())
            })
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn delete_user(&self, id: u64) -> Result<(), StoreError> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let ledger = self.open_tree(LEDGER)?;
        // Scans are not available inside a transaction, so the entry keys
        // are collected first and removed together with the user record.
        let entry_keys = ledger
            .scan_prefix(serialize_id(id))
            .keys()
            .collect::<sled::Result<Vec<_>>>()?;
        (&users, &users_username, &ledger)
            .transaction(|(users, users_username, ledger)| {
                if let Some(raw) = users.remove(&serialize_id(id))? {
                    let user: User = bincode::deserialize(&raw).unwrap();
                    users_username.remove(user.username.as_bytes())?;
                }
                for key in &entry_keys {
                    ledger.remove(key.as_ref())?;
                }
                Ok(())
            })
            .map_err(StoreError::from)?;
        Ok(())
    }
}

pub trait LedgerStore {
    fn add_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError>;
    fn get_entry(&self, user_id: u64, imdb_id: &str) -> Result<Option<LedgerEntry>, StoreError>;
    fn update_entry(
        &self,
        user_id: u64,
        imdb_id: &str,
        favorite: bool,
        platform: Option<Platform>,
        date_viewed: Option<NaiveDate>,
    ) -> Result<LedgerEntry, StoreError>;
    fn remove_entry(&self, user_id: u64, imdb_id: &str) -> Result<(), StoreError>;
    fn toggle_favorite(&self, user_id: u64, imdb_id: &str) -> Result<bool, StoreError>;
    fn list_entries(&self, user_id: u64, query: &LedgerQuery)
        -> Result<Vec<LedgerEntry>, StoreError>;
    fn in_ledger(&self, user_id: u64, imdb_id: &str) -> Result<bool, StoreError>;
}

impl LedgerStore for sled::Db {
    fn add_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let users = self.open_tree(USERS)?;
        let ledger = self.open_tree(LEDGER)?;
        let key = entry_key(entry.user_id, &entry.imdb_id);
        (&users, &ledger)
            .transaction(|(users, ledger)| {
                // No entry without an owning user.
                if users.get(&serialize_id(entry.user_id))?.is_none() {
                    return abort(StoreError::NotFound);
                }
                if ledger
                    .insert(key.as_slice(), bincode::serialize(entry).unwrap())?
                    .is_some()
                {
                    return abort(StoreError::DuplicateEntry);
                }
                Ok(())
            })
            .map_err(StoreError::from)?;
        Ok(())
    }

    fn get_entry(&self, user_id: u64, imdb_id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        Ok(ledger
            .get(entry_key(user_id, imdb_id))?
            .map(|d| bincode::deserialize(&d).unwrap()))
    }

    fn update_entry(
        &self,
        user_id: u64,
        imdb_id: &str,
        favorite: bool,
        platform: Option<Platform>,
        date_viewed: Option<NaiveDate>,
    ) -> Result<LedgerEntry, StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        let key = entry_key(user_id, imdb_id);
        let entry = ledger
            .transaction(|ledger| {
                let raw = match ledger.get(key.as_slice())? {
                    Some(raw) => raw,
                    None => return abort(StoreError::NotFound),
                };
                let mut entry: LedgerEntry = bincode::deserialize(&raw).unwrap();
                entry.favorite = favorite;
                entry.platform = platform;
                entry.date_viewed = date_viewed;
                ledger.insert(key.as_slice(), bincode::serialize(&entry).unwrap())?;
                Ok(entry)
            })
            .map_err(StoreError::from)?;
        Ok(entry)
    }

    fn remove_entry(&self, user_id: u64, imdb_id: &str) -> Result<(), StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        ledger.remove(entry_key(user_id, imdb_id))?;
        Ok(())
    }

    fn toggle_favorite(&self, user_id: u64, imdb_id: &str) -> Result<bool, StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        let key = entry_key(user_id, imdb_id);
        let favorite = ledger
            .transaction(|ledger| {
                let raw = match ledger.get(key.as_slice())? {
                    Some(raw) => raw,
                    None => return abort(StoreError::NotFound),
                };
                let mut entry: LedgerEntry = bincode::deserialize(&raw).unwrap();
                entry.favorite = !entry.favorite;
                ledger.insert(key.as_slice(), bincode::serialize(&entry).unwrap())?;
                Ok(entry.favorite)
            })
            .map_err(StoreError::from)?;
        Ok(favorite)
    }

    fn list_entries(
        &self,
        user_id: u64,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        let mut entries = Vec::new();
        for item in ledger.scan_prefix(serialize_id(user_id)) {
            let (_, raw) = item?;
            let entry: LedgerEntry = bincode::deserialize(&raw).unwrap();
            if query.favorites_only && !entry.favorite {
                continue;
            }
            entries.push(entry);
        }
        if let Some((key, order)) = query.sort {
            entries.sort_by(|a, b| {
                let ordering = match key {
                    SortKey::Title => a.title.cmp(&b.title),
                    SortKey::Year => a.year.cmp(&b.year),
                    SortKey::DateAdded => a.date_added.cmp(&b.date_added),
                    // Absent dates sort after every present date ascending,
                    // before them descending.
                    SortKey::DateViewed => (a.date_viewed.is_none(), a.date_viewed)
                        .cmp(&(b.date_viewed.is_none(), b.date_viewed)),
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
        Ok(entries)
    }

    fn in_ledger(&self, user_id: u64, imdb_id: &str) -> Result<bool, StoreError> {
        let ledger = self.open_tree(LEDGER)?;
        Ok(ledger.contains_key(entry_key(user_id, imdb_id))?)
    }
}
