//! Manage the privileges needed to open raw sockets.
//!
//! - On Linux `CAP_NET_RAW` is raised from the permitted set to the effective
//!   set before the sockets are opened and the effective set is cleared once
//!   they are open.
//! - On other unix platforms raw sockets require the effective user to be root
//!   and privileges are left unchanged.

/// Run-time platform privilege information.
#[derive(Debug)]
pub struct Privilege {
    has_privileges: bool,
}

impl Privilege {
    #[cfg(test)]
    pub const fn new(has_privileges: bool) -> Self {
        Self { has_privileges }
    }

    /// Are we running with the privileges required for raw sockets?
    pub const fn has_privileges(&self) -> bool {
        self.has_privileges
    }

    // Linux

    #[cfg(target_os = "linux")]
    /// Acquire privileges, if possible.
    ///
    /// Check if `CAP_NET_RAW` is in the permitted set and if so raise it to the effective set.
    pub fn acquire_privileges() -> anyhow::Result<Self> {
        if caps::has_cap(None, caps::CapSet::Permitted, caps::Capability::CAP_NET_RAW)? {
            caps::raise(None, caps::CapSet::Effective, caps::Capability::CAP_NET_RAW)?;
        }
        let has_privileges =
            caps::has_cap(None, caps::CapSet::Effective, caps::Capability::CAP_NET_RAW)?;
        tracing::debug!(has_privileges, "acquired privileges");
        Ok(Self { has_privileges })
    }

    #[cfg(target_os = "linux")]
    /// Drop all privileges.
    ///
    /// Clears the effective set.
    pub fn drop_privileges() -> anyhow::Result<()> {
        caps::clear(None, caps::CapSet::Effective)?;
        tracing::debug!("dropped privileges");
        Ok(())
    }

    // Unix (excl. Linux)

    #[cfg(all(unix, not(target_os = "linux")))]
    #[expect(clippy::unnecessary_wraps)]
    /// Acquire privileges, if possible.
    ///
    /// Checks if the effective user is root.
    pub fn acquire_privileges() -> anyhow::Result<Self> {
        Ok(Self {
            has_privileges: nix::unistd::Uid::effective().is_root(),
        })
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    #[expect(clippy::unnecessary_wraps)]
    /// Drop all privileges.
    ///
    /// This is a no-op on non-Linux unix systems.
    pub fn drop_privileges() -> anyhow::Result<()> {
        Ok(())
    }
}
