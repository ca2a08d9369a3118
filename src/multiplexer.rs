//! epoll registry mapping groups of fds to the owner that handles them.

use crate::error::{Error, Result};
use log::trace;
use std::collections::HashMap;
use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

pub type SubscriberId = u64;

/// One ready fd and who it belonged to when the batch was collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness<K> {
    pub fd: RawFd,
    pub subscriber: SubscriberId,
    pub owner: K,
}

#[derive(Debug)]
struct Subscriber<K> {
    fds: Vec<RawFd>,
    owner: K,
}

#[derive(Debug)]
pub struct EventMultiplexer<K> {
    epoll: OwnedFd,
    routes: HashMap<RawFd, SubscriberId>,
    subscribers: HashMap<SubscriberId, Subscriber<K>>,
    next_id: SubscriberId,
    max_events: usize,
}

fn epoll_ctl(epoll: RawFd, op: libc::c_int, fd: RawFd) -> io::Result<()> {
    let mut event = libc::epoll_event {
        events: libc::EPOLLIN as u32,
        u64: fd as u64,
    };
    if unsafe { libc::epoll_ctl(epoll, op, fd, &mut event) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl<K: Clone> EventMultiplexer<K> {
    pub fn new(max_events: usize) -> Result<Self> {
        let raw = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if raw < 0 {
            return Err(Error::Multiplexer {
                op: "create",
                fd: -1,
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            epoll: unsafe { OwnedFd::from_raw_fd(raw) },
            routes: HashMap::new(),
            subscribers: HashMap::new(),
            next_id: 0,
            max_events: max_events.max(1),
        })
    }

    /// Registers `fds` so readiness on any of them routes to `owner`.
    pub fn add_subscriber(&mut self, fds: &[RawFd], owner: K) -> Result<SubscriberId> {
        for (i, fd) in fds.iter().enumerate() {
            if self.routes.contains_key(fd) || fds[..i].contains(fd) {
                return Err(Error::DuplicateFd(*fd));
            }
        }

        for (i, &fd) in fds.iter().enumerate() {
            if let Err(source) = epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_ADD, fd) {
                for &added in &fds[..i] {
                    let _ = epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_DEL, added);
                }
                return Err(Error::Multiplexer { op: "add", fd, source });
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        for &fd in fds {
            self.routes.insert(fd, id);
        }
        self.subscribers.insert(
            id,
            Subscriber {
                fds: fds.to_vec(),
                owner,
            },
        );
        trace!("Subscriber {} registered fds {:?}", id, fds);
        Ok(id)
    }

    /// Deregisters every fd of `id`. Must run before those fds are closed.
    pub fn remove_subscriber(&mut self, id: SubscriberId) -> Result<K> {
        let subscriber = self
            .subscribers
            .remove(&id)
            .ok_or(Error::UnknownSubscriber(id))?;

        let mut result = Ok(());
        for &fd in &subscriber.fds {
            self.routes.remove(&fd);
            if let Err(source) = epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_DEL, fd)
                && result.is_ok()
            {
                result = Err(Error::Multiplexer { op: "remove", fd, source });
            }
        }
        trace!("Subscriber {} removed fds {:?}", id, subscriber.fds);
        result.map(|_| subscriber.owner)
    }

    pub fn owner_of(&self, id: SubscriberId) -> Option<&K> {
        self.subscribers.get(&id).map(|s| &s.owner)
    }

    pub fn subscriber_of(&self, fd: RawFd) -> Option<SubscriberId> {
        self.routes.get(&fd).copied()
    }

    /// False once the fd was deregistered or handed to another subscriber.
    pub fn is_current(&self, readiness: &Readiness<K>) -> bool {
        self.subscriber_of(readiness.fd) == Some(readiness.subscriber)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Waits up to `timeout` (forever when `None`) and returns at most
    /// `max_events` ready fds in kernel order. An interrupted wait is empty.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Readiness<K>>> {
        let timeout_ms = timeout
            .map(|t| t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int)
            .unwrap_or(-1);
        let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; self.max_events];

        let n = unsafe {
            libc::epoll_wait(
                self.epoll.as_raw_fd(),
                events.as_mut_ptr(),
                events.len() as libc::c_int,
                timeout_ms,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(Error::Wait(err));
        }

        Ok(events[..n as usize]
            .iter()
            .filter_map(|event| {
                let fd = event.u64 as RawFd;
                let subscriber = self.subscriber_of(fd)?;
                let owner = self.owner_of(subscriber)?.clone();
                Some(Readiness { fd, subscriber, owner })
            })
            .collect())
    }

    /// Waits once and hands each still-current readiness to `dispatch`.
    /// Returns the size of the batch.
    pub fn wait_and_dispatch<F>(&mut self, timeout: Option<Duration>, mut dispatch: F) -> Result<usize>
    where
        F: FnMut(&mut Self, &Readiness<K>) -> Result<()>,
    {
        let batch = self.wait(timeout)?;
        for readiness in &batch {
            // An earlier dispatch in this batch may have moved or closed it.
            if !self.is_current(readiness) {
                trace!("Skipping stale readiness on fd {}", readiness.fd);
                continue;
            }
            dispatch(self, readiness)?;
        }
        Ok(batch.len())
    }
}

impl<K> AsRawFd for EventMultiplexer<K> {
    fn as_raw_fd(&self) -> RawFd {
        self.epoll.as_raw_fd()
    }
}
