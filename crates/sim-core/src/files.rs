//! Named, mutually exclusive file resources with FIFO wait queues.
//!
//! The manager never touches process state. Callers learn about ownership changes from
//! return values: [`FileResourceManager::release`] reports the waiter that inherited the
//! lock and [`FileResourceManager::reconcile`] reports blocked processes it granted.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use serde::Serialize;

use crate::error::Result;
use crate::error::SimError;
use crate::Pid;
use crate::Tick;

/// A single named resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResource {
    name: String,
    owner: Option<Pid>,
    wait_queue: VecDeque<Pid>,
    use_count: u64,
    conflict_count: u64,
}

impl FileResource {
    fn new(name: String) -> Self {
        Self {
            name,
            owner: None,
            wait_queue: VecDeque::new(),
            use_count: 0,
            conflict_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    pub fn wait_queue(&self) -> &VecDeque<Pid> {
        &self.wait_queue
    }

    /// Number of grants, hand-offs included
    pub fn use_count(&self) -> u64 {
        self.use_count
    }

    pub fn conflict_count(&self) -> u64 {
        self.conflict_count
    }

    fn grant(&mut self, pid: Pid) {
        self.owner = Some(pid);
        self.use_count += 1;
        self.wait_queue.retain(|&waiter| waiter != pid);
    }
}

/// Outcome of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Held by `owner`; `enqueued` is false when the requester was already waiting
    Denied { owner: Pid, enqueued: bool },
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub resources: usize,
    pub locked: usize,
    pub waiting: usize,
    pub conflicts_total: u64,
    pub successful_grants: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FileResourceManager {
    resources: BTreeMap<String, FileResource>,
    conflicts_total: u64,
    successful_grants: u64,
}

impl FileResourceManager {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resources = names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), FileResource::new(name))
            })
            .collect();
        Self {
            resources,
            conflicts_total: 0,
            successful_grants: 0,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Requests exclusive access to `name` for `pid`.
    ///
    /// A request by the current owner is granted without side effects. A denied requester
    /// is enqueued at most once.
    pub fn request(&mut self, pid: Pid, name: &str, now: Tick) -> Result<Access> {
        let Some(resource) = self.resources.get_mut(name) else {
            return Err(error_stack::report!(SimError::unknown_resource(name)));
        };
        match resource.owner {
            Some(owner) if owner == pid => Ok(Access::Granted),
            None => {
                resource.grant(pid);
                self.successful_grants += 1;
                tracing::debug!(pid, resource = name, tick = now, "resource granted");
                Ok(Access::Granted)
            }
            Some(owner) => {
                if resource.wait_queue.contains(&pid) {
                    return Ok(Access::Denied {
                        owner,
                        enqueued: false,
                    });
                }
                resource.wait_queue.push_back(pid);
                resource.conflict_count += 1;
                self.conflicts_total += 1;
                tracing::debug!(
                    pid,
                    owner,
                    resource = name,
                    tick = now,
                    "resource busy, request queued"
                );
                Ok(Access::Denied {
                    owner,
                    enqueued: true,
                })
            }
        }
    }

    /// Releases `name` held by `pid` and hands it to the head of the wait queue.
    ///
    /// Returns the new owner, if a waiter inherited the lock.
    pub fn release(&mut self, name: &str, pid: Pid, now: Tick) -> Result<Option<Pid>> {
        let Some(resource) = self.resources.get_mut(name) else {
            return Err(error_stack::report!(SimError::unknown_resource(name)));
        };
        if resource.owner != Some(pid) {
            let owner = resource.owner;
            tracing::warn!(pid, ?owner, resource = name, "release by non-owner ignored");
            return Err(error_stack::report!(SimError::NotOwner {
                resource: name.to_string(),
                pid,
                owner,
            }));
        }

        resource.owner = None;
        let next = resource.wait_queue.pop_front();
        if let Some(next) = next {
            resource.grant(next);
            self.successful_grants += 1;
            tracing::debug!(from = pid, to = next, resource = name, tick = now, "resource handed off");
        } else {
            tracing::debug!(pid, resource = name, tick = now, "resource released");
        }
        Ok(next)
    }

    /// Grants free resources to the blocked processes waiting on them.
    ///
    /// `blocked` pairs each blocked pid with the resource it awaits, in blocked-queue order.
    /// Returns the pairs that were granted; the caller unblocks them.
    pub fn reconcile<'a, I>(&mut self, blocked: I, now: Tick) -> Vec<(Pid, String)>
    where
        I: IntoIterator<Item = (Pid, &'a str)>,
    {
        let mut granted = Vec::new();
        for (pid, name) in blocked {
            if !self.is_available(name) {
                continue;
            }
            match self.request(pid, name, now) {
                Ok(Access::Granted) => granted.push((pid, name.to_string())),
                Ok(Access::Denied { .. }) => {}
                Err(report) => tracing::warn!(pid, resource = name, "reconcile skipped: {report:?}"),
            }
        }
        granted
    }

    /// Removes `pid` from the wait queue of `name`. Returns whether it was queued.
    pub fn withdraw(&mut self, name: &str, pid: Pid) -> bool {
        let Some(resource) = self.resources.get_mut(name) else {
            return false;
        };
        let before = resource.wait_queue.len();
        resource.wait_queue.retain(|&waiter| waiter != pid);
        before != resource.wait_queue.len()
    }

    /// True when `name` is configured and unlocked.
    pub fn is_available(&self, name: &str) -> bool {
        self.resources
            .get(name)
            .is_some_and(|resource| !resource.is_locked())
    }

    pub fn owner_of(&self, name: &str) -> Option<Pid> {
        self.resources.get(name).and_then(FileResource::owner)
    }

    pub fn resource(&self, name: &str) -> Option<&FileResource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &FileResource> {
        self.resources.values()
    }

    pub fn conflicts_total(&self) -> u64 {
        self.conflicts_total
    }

    pub fn successful_grants(&self) -> u64 {
        self.successful_grants
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            resources: self.resources.len(),
            locked: self.resources.values().filter(|r| r.is_locked()).count(),
            waiting: self.resources.values().map(|r| r.wait_queue.len()).sum(),
            conflicts_total: self.conflicts_total,
            successful_grants: self.successful_grants,
        }
    }
}
