/// Status register bits (`NV-BDIZC`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flag {
    Carry = 0b0000_0001,
    Zero = 0b0000_0010,
    InterruptDisable = 0b0000_0100,
    Decimal = 0b0000_1000,
    Break = 0b0001_0000,
    /// Always reads as 1.
    Unused = 0b0010_0000,
    Overflow = 0b0100_0000,
    Negative = 0b1000_0000,
}

impl Flag {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

/// Status byte after reset: unused and interrupt-disable set.
pub const RESET_STATUS: u8 = 0b0010_0100;
/// Stack pointer after reset, top of page 1.
pub const RESET_SP: u8 = 0xFF;
/// The stack lives in page 1.
pub const STACK_PAGE: u16 = 0x0100;

/// The register file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Registers {
    /// Accumulator
    pub a: u8,
    /// Index register X
    pub x: u8,
    /// Index register Y
    pub y: u8,
    /// Stack pointer, offset into page 1
    pub sp: u8,
    /// Program counter
    pub pc: u16,
    /// Processor status, only mutated through the flag setters
    p: u8,
}

impl Registers {
    pub fn new() -> Self {
        Registers {
            a: 0,
            x: 0,
            y: 0,
            sp: RESET_SP,
            pc: 0,
            p: RESET_STATUS,
        }
    }

    pub fn reset(&mut self) {
        *self = Registers::new();
    }

    pub fn status(&self) -> u8 {
        self.p
    }

    /// Replace the whole status byte. The unused bit stays set.
    pub fn set_status(&mut self, value: u8) {
        self.p = value | Flag::Unused.mask();
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.p & flag.mask() != 0
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.p |= flag.mask();
        } else {
            self.p &= !flag.mask();
        }
        self.p |= Flag::Unused.mask();
    }

    /// Zero and negative flags from a result.
    pub fn set_zn(&mut self, value: u8) {
        self.set_flag(Flag::Zero, value == 0);
        self.set_flag(Flag::Negative, value & 0x80 != 0);
    }

    pub fn carry(&self) -> bool {
        self.flag(Flag::Carry)
    }

    pub fn zero(&self) -> bool {
        self.flag(Flag::Zero)
    }

    pub fn overflow(&self) -> bool {
        self.flag(Flag::Overflow)
    }

    pub fn negative(&self) -> bool {
        self.flag(Flag::Negative)
    }

    /// Full address the stack pointer refers to.
    pub fn stack_addr(&self) -> u16 {
        STACK_PAGE | self.sp as u16
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_state() {
        let mut regs = Registers::new();
        regs.a = 5;
        regs.pc = 0x1234;
        regs.set_flag(Flag::Carry, true);
        regs.reset();
        assert_eq!(regs.a, 0);
        assert_eq!(regs.x, 0);
        assert_eq!(regs.y, 0);
        assert_eq!(regs.sp, 0xFF);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.status(), 0b0010_0100);
    }

    #[test]
    fn unused_bit_stays_set() {
        let mut regs = Registers::new();
        regs.set_flag(Flag::Unused, false);
        assert!(regs.flag(Flag::Unused));
        regs.set_status(0);
        assert_eq!(regs.status(), 0b0010_0000);
    }

    #[test]
    fn set_zn() {
        let mut regs = Registers::new();
        regs.set_zn(0);
        assert!(regs.zero() && !regs.negative());
        regs.set_zn(0x80);
        assert!(!regs.zero() && regs.negative());
        regs.set_zn(0x7F);
        assert!(!regs.zero() && !regs.negative());
    }

    #[test]
    fn flags_are_independent() {
        let mut regs = Registers::new();
        regs.set_flag(Flag::Overflow, true);
        regs.set_flag(Flag::Carry, true);
        regs.set_flag(Flag::Overflow, false);
        assert!(regs.carry());
        assert!(!regs.overflow());
        assert!(regs.flag(Flag::InterruptDisable));
    }
}
