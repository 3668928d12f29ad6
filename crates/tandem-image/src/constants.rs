//! ELF specification constants.

// ELF header constants
pub const ELF_MAGIC: u32 = 0x464C_457F; // 0x7F 'E' 'L' 'F'
pub const ELF_CLASS_32: u8 = 1;
pub const ELF_CLASS_64: u8 = 2;
pub const ELF_DATA_LSB: u8 = 1;
pub const ELF_TYPE_EXEC: u16 = 2;
pub const ELF_MACHINE_RISCV: u16 = 243;

// Program header constants
pub const PT_LOAD: u32 = 1;

// Program header flags
pub const PF_X: u32 = 0x1; // Execute
pub const PF_W: u32 = 0x2; // Write
pub const PF_R: u32 = 0x4; // Read

// Section header constants
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;

// Header sizes per class
pub const EHDR_SIZE_32: usize = 52;
pub const EHDR_SIZE_64: usize = 64;
pub const PHDR_SIZE_32: usize = 32;
pub const PHDR_SIZE_64: usize = 56;
pub const SHDR_SIZE_32: usize = 40;
pub const SHDR_SIZE_64: usize = 64;
pub const SYM_SIZE_32: usize = 16;
pub const SYM_SIZE_64: usize = 24;

// HTIF symbol names used by riscv-tests and fesvr-style workloads
pub const TOHOST_SYMBOL: &str = "tohost";
pub const FROMHOST_SYMBOL: &str = "fromhost";

// Limits
pub const MAX_SEGMENTS: usize = 16;
