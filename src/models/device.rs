/// A device as referenced by a secret. Devices are never created here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub id: u64,
    pub name: String,
}
